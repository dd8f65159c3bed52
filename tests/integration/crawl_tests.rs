//! Integration tests for the crawler
//!
//! These tests use wiremock to create a mock course site and run the full
//! crawl cycle end-to-end: login handshake, page visits, link following and
//! re-authentication.

use course_spider::config::{
    Config, CrawlerConfig, CredentialsConfig, OutputConfig, OutputFormat, SiteConfig,
    UserAgentConfig,
};
use course_spider::crawler::crawl;
use course_spider::output::{MemorySink, PageRecord, JSONL_FILE_NAME};
use course_spider::{CrawlPhase, Engine};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COURSE_KEY: &str = "course-v1:edX+Test101+course";
const INFO_PATH: &str = "/courses/course-v1:edX+Test101+course/info";
const COURSEWARE_PATH: &str = "/courses/course-v1:edX+Test101+course/courseware/";
const PROGRESS_PATH: &str = "/courses/course-v1:edX+Test101+course/progress";
const PROGRESS_NEXT: &str = "%2Fcourses%2Fcourse-v1%3AedX%2BTest101%2Bcourse%2Fprogress";
const LOGIN_API: &str = "/user_api/v1/account/login_session/";

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, email: &str, password: &str) -> Config {
    Config {
        site: SiteConfig {
            domain: format!("127.0.0.1:{}", server.address().port()),
            scheme: "http".to_string(),
            course_key: COURSE_KEY.to_string(),
        },
        credentials: CredentialsConfig {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            http_user: None,
            http_pass: None,
        },
        crawler: CrawlerConfig {
            max_concurrent_requests: 4,
            download_delay: 0,
            request_timeout: 5,
            max_reauth_attempts: 3,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestSpider".to_string(),
            crawler_version: "1.0.0".to_string(),
        },
        output: OutputConfig::default(),
    }
}

fn html(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, anchors
        ))
        .insert_header("content-type", "text/html")
}

/// Mounts the login page and a login API that accepts the test credentials
async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            html("Sign in", &[]).insert_header("set-cookie", "csrftoken=tok123; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(LOGIN_API))
        .and(header("x-csrftoken", "tok123"))
        .and(body_string_contains("email=staff%40example.org"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"success": true}"#)
                .insert_header("set-cookie", "sessionid=s1; Path=/"),
        )
        .mount(server)
        .await;
}

fn record_for<'a>(records: &'a [PageRecord], route: &str) -> Option<&'a PageRecord> {
    records.iter().find(|record| record.url.ends_with(route))
}

#[tokio::test]
async fn test_login_then_crawl_course() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html("  Course Info  ", &[COURSEWARE_PATH, PROGRESS_PATH]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COURSEWARE_PATH))
        .respond_with(html("Courseware", &[PROGRESS_PATH, INFO_PATH]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(html("Progress", &[COURSEWARE_PATH]))
        .expect(1)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "edx");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert_eq!(stats.pages_recorded, 3);
    assert_eq!(stats.final_phase, Some(CrawlPhase::Crawling));

    let info = record_for(&records, INFO_PATH).expect("info page recorded");
    assert_eq!(info.page_title.as_deref(), Some("Course Info"));
    let cookie = info
        .request_headers
        .get("cookie")
        .expect("session cookie recorded");
    assert!(cookie.contains("sessionid=s1"));

    assert!(record_for(&records, COURSEWARE_PATH).is_some());
    assert!(record_for(&records, PROGRESS_PATH).is_some());
}

#[tokio::test]
async fn test_rejected_login_halts_crawl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            html("Sign in", &[]).insert_header("set-cookie", "csrftoken=tok123; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN_API))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"success": false, "value": "We couldn't sign you in."}"#),
        )
        .mount(&server)
        .await;
    Mock::given(path(INFO_PATH))
        .respond_with(html("Course Info", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "wrong");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(sink.is_empty());
    assert!(stats.halted());
    assert_eq!(stats.requests_sent, 2);
}

#[tokio::test]
async fn test_missing_credentials_send_no_requests() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "", "");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.requests_sent, 0);
    assert!(sink.is_empty());
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_logout_mid_crawl_reauthenticates_and_resumes() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html("Course Info", &[PROGRESS_PATH]))
        .mount(&server)
        .await;

    // The first progress fetch finds the session gone
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("/login?next={}", PROGRESS_NEXT).as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(html("Progress", &[]))
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "edx");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let records = sink.records();
    assert_eq!(stats.reauthentications, 1);
    assert_eq!(stats.final_phase, Some(CrawlPhase::Crawling));
    assert_eq!(records.len(), 2);
    assert_eq!(
        record_for(&records, PROGRESS_PATH).and_then(|r| r.page_title.as_deref()),
        Some("Progress")
    );
    assert!(records.iter().all(|r| !r.url.contains("/login")));

    // The re-authentication login carried the interrupted page
    let received = server.received_requests().await.unwrap_or_default();
    let resumed_login = received
        .iter()
        .filter(|request| request.url.path() == LOGIN_API)
        .any(|request| {
            request
                .url
                .query_pairs()
                .any(|(k, v)| k == "next" && v == PROGRESS_PATH)
        });
    assert!(resumed_login);
}

#[tokio::test]
async fn test_login_api_redirect_resumes_page() {
    let server = MockServer::start().await;

    // Re-authentication answer: redirect straight to the interrupted page
    Mock::given(method("POST"))
        .and(path(LOGIN_API))
        .and(query_param("next", PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(302).insert_header("location", PROGRESS_PATH))
        .mount(&server)
        .await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html("Course Info", &[PROGRESS_PATH]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("/login?next={}", PROGRESS_NEXT).as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(html("Progress", &[]))
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "edx");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let records = sink.records();
    assert_eq!(stats.reauthentications, 1);
    assert_eq!(records.len(), 2);
    assert!(record_for(&records, PROGRESS_PATH).is_some());
}

#[tokio::test]
async fn test_resumed_page_error_does_not_halt_crawl() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_API))
        .and(query_param("next", PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(302).insert_header("location", PROGRESS_PATH))
        .mount(&server)
        .await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html("Course Info", &[PROGRESS_PATH, COURSEWARE_PATH]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("/login?next={}", PROGRESS_NEXT).as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COURSEWARE_PATH))
        .respond_with(html("Courseware", &[]))
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "edx");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let records = sink.records();
    assert_eq!(stats.reauthentications, 1);
    assert_eq!(stats.final_phase, Some(CrawlPhase::Crawling));
    assert!(!stats.halted());
    assert_eq!(records.len(), 2);
    assert!(record_for(&records, COURSEWARE_PATH).is_some());
    assert!(record_for(&records, PROGRESS_PATH).is_none());
}

#[tokio::test]
async fn test_redirects_to_same_page_record_it_once() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html("Course Info", &["/courses/old-a", "/courses/old-c"]))
        .mount(&server)
        .await;
    for old in ["/courses/old-a", "/courses/old-c"] {
        Mock::given(method("GET"))
            .and(path(old))
            .respond_with(ResponseTemplate::new(302).insert_header("location", COURSEWARE_PATH))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(COURSEWARE_PATH))
        .respond_with(html("Courseware", &[]))
        .expect(2)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "edx");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let records = sink.records();
    let courseware_records = records
        .iter()
        .filter(|record| record.url.ends_with(COURSEWARE_PATH))
        .count();
    assert_eq!(courseware_records, 1);
    assert_eq!(records.len(), 2);
    assert_eq!(stats.pages_recorded, 2);
    assert_eq!(stats.duplicate_pages, 1);
}

#[tokio::test]
async fn test_excluded_links_are_not_followed() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html(
            "Course Info",
            &[
                "/logout/",
                "/login?next=%2Fdashboard",
                "/xblock/block-v1:edX+Test101+course+type@problem+block@abc/handler/view",
                "/export/course?_accept=application/x-tgz",
                "http://offsite.example.com/page",
                COURSEWARE_PATH,
            ],
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COURSEWARE_PATH))
        .respond_with(html("Courseware", &[]))
        .mount(&server)
        .await;
    Mock::given(path("/logout/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(path("/export/course"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "edx");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(sink.len(), 2);
    assert_eq!(stats.links_excluded, 5);
    assert_eq!(stats.reauthentications, 0);

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received
        .iter()
        .all(|request| !request.url.path().starts_with("/xblock/")));
    // Only the handshake fetched the login page; the "Sign in" link was not followed
    let login_fetches = received
        .iter()
        .filter(|request| request.url.path() == "/login")
        .count();
    assert_eq!(login_fetches, 1);
}

#[tokio::test]
async fn test_failed_page_does_not_stop_crawl() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html("Course Info", &["/courses/missing", COURSEWARE_PATH]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COURSEWARE_PATH))
        .respond_with(html("Courseware", &[]))
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let config = create_test_config(&server, "staff@example.org", "edx");
    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.http_failures, 1);
    assert_eq!(sink.len(), 2);
    assert_eq!(stats.final_phase, Some(CrawlPhase::Crawling));
}

#[tokio::test]
async fn test_basic_auth_on_every_request() {
    let server = MockServer::start().await;

    // "gate:secret" in base64; anything without it gets the wiremock 404
    let gate = "Basic Z2F0ZTpzZWNyZXQ=";
    Mock::given(method("GET"))
        .and(path("/login"))
        .and(header("authorization", gate))
        .respond_with(
            html("Sign in", &[]).insert_header("set-cookie", "csrftoken=tok123; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN_API))
        .and(header("authorization", gate))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .and(header("authorization", gate))
        .respond_with(html("Course Info", &[]))
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let mut config = create_test_config(&server, "staff@example.org", "edx");
    config.credentials.http_user = Some("gate".to_string());
    config.credentials.http_pass = Some("secret".to_string());

    let stats = Engine::new(&config, Box::new(sink.clone()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(sink.len(), 1);
    assert!(!stats.halted());
}

#[tokio::test]
async fn test_crawl_writes_jsonl_output() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(html("Course Info", &[]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, "staff@example.org", "edx");
    config.output = OutputConfig {
        data_dir: dir.path().join("out"),
        format: OutputFormat::Jsonl,
    };

    let stats = crawl(config, "test-hash").await.unwrap();
    assert_eq!(stats.pages_recorded, 1);

    let content = std::fs::read_to_string(dir.path().join("out").join(JSONL_FILE_NAME)).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);

    let record: PageRecord = serde_json::from_str(lines[0]).unwrap();
    assert!(record.url.ends_with(INFO_PATH));
    assert_eq!(record.page_title.as_deref(), Some("Course Info"));
}
