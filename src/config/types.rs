use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Course-Spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The site being crawled
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Hostname of the site, optionally with a port (e.g. "courses.example.org")
    pub domain: String,

    /// URL scheme used to reach the site
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Course (or content library) key the crawl starts from
    #[serde(rename = "course-key")]
    pub course_key: String,
}

/// Login credentials
///
/// Missing credentials are not a configuration error: the crawl simply never
/// starts, and says so in the log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    /// Login email
    #[serde(default)]
    pub email: Option<String>,

    /// Login password
    #[serde(default)]
    pub password: Option<String>,

    /// HTTP basic-auth user for sites behind an extra access gate
    #[serde(rename = "http-user", default)]
    pub http_user: Option<String>,

    /// HTTP basic-auth password
    #[serde(rename = "http-pass", default)]
    pub http_pass: Option<String>,
}

/// Fetch engine behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of requests in flight at once
    #[serde(rename = "max-concurrent-requests", default = "default_max_concurrent")]
    pub max_concurrent_requests: u32,

    /// Minimum time between two request dispatches (milliseconds)
    #[serde(rename = "download-delay", default)]
    pub download_delay: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// How many times the crawler re-authenticates for the same interrupted URL
    #[serde(rename = "max-reauth-attempts", default = "default_max_reauth")]
    pub max_reauth_attempts: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            download_delay: 0,
            request_timeout: default_request_timeout(),
            max_reauth_attempts: default_max_reauth(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "CourseSpider".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory page records are written into
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Record format
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            format: OutputFormat::default(),
        }
    }
}

/// Page record output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `<data-dir>/pages.db`
    #[default]
    Sqlite,
    /// `<data-dir>/pages.jsonl`
    Jsonl,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_max_concurrent() -> u32 {
    8
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_reauth() -> u32 {
    3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
