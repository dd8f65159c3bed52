use crate::config::{Config, CredentialsConfig, SiteConfig};
use crate::UrlError;
use std::fmt;
use url::Url;

/// Path of the HTML login page; fetching it yields the CSRF cookie
pub const LOGIN_PAGE_PATH: &str = "/login";

/// Path of the form-based login API
pub const LOGIN_API_PATH: &str = "/user_api/v1/account/login_session/";

/// Path of the course blocks API
pub const COURSE_BLOCKS_API_PATH: &str = "/api/courses/v1/blocks/";

/// Phrase the site puts in the login response body when it refuses the credentials
pub const LOGIN_FAILURE_MSG: &str = "We couldn't sign you in.";

/// HTTP basic-auth credentials for sites behind an extra access gate
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub pass: Option<String>,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Immutable login credentials plus the URLs derived from them
///
/// Built once at crawl start and owned by the crawl state machine. Every method
/// is a pure builder; nothing here touches the network.
#[derive(Clone)]
pub struct CredentialSession {
    base_url: Url,
    email: String,
    password: String,
    course_key: String,
    basic_auth: Option<BasicAuth>,
}

impl CredentialSession {
    /// Creates a session from the site and credential sections of the config
    ///
    /// # Returns
    ///
    /// * `Ok(CredentialSession)` - The site base URL could be built
    /// * `Err(UrlError)` - The scheme/domain pair is not a usable URL
    pub fn new(site: &SiteConfig, credentials: &CredentialsConfig) -> Result<Self, UrlError> {
        let base_url = Url::parse(&format!("{}://{}/", site.scheme, site.domain))
            .map_err(|e| UrlError::Parse(format!("{}://{}: {}", site.scheme, site.domain, e)))?;

        if base_url.host_str().is_none() {
            return Err(UrlError::MissingDomain);
        }

        let basic_auth = credentials
            .http_user
            .as_ref()
            .filter(|user| !user.is_empty())
            .map(|user| BasicAuth {
                user: user.clone(),
                pass: credentials.http_pass.clone(),
            });

        Ok(Self {
            base_url,
            email: credentials.email.clone().unwrap_or_default(),
            password: credentials.password.clone().unwrap_or_default(),
            course_key: site.course_key.clone(),
            basic_auth,
        })
    }

    /// Creates a session from a full configuration
    pub fn from_config(config: &Config) -> Result<Self, UrlError> {
        Self::new(&config.site, &config.credentials)
    }

    /// Root URL of the site
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Host of the site, without port
    pub fn site_host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    /// Returns true when both an email and a password are present
    pub fn has_credentials(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }

    /// Login email
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Basic-auth credentials, if the site needs them
    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    /// `GET` target whose response carries the CSRF cookie
    pub fn login_page_url(&self) -> Url {
        self.url_for(LOGIN_PAGE_PATH)
    }

    /// `POST` target for the login form
    pub fn login_api_url(&self) -> Url {
        self.url_for(LOGIN_API_PATH)
    }

    /// Login API URL carrying `next`, so a successful login lands on the interrupted page
    pub fn resume_login_api_url(&self, next: &str) -> Url {
        let mut url = self.login_api_url();
        url.query_pairs_mut().append_pair("next", next);
        url
    }

    /// Course info page, the seed of the crawl
    pub fn course_info_url(&self) -> Url {
        self.url_for(&format!("/courses/{}/info", self.course_key))
    }

    /// Course blocks API listing every block of the course
    pub fn course_blocks_url(&self) -> Url {
        let mut url = self.url_for(COURSE_BLOCKS_API_PATH);
        url.query_pairs_mut()
            .append_pair("course_id", &self.course_key)
            .append_pair("depth", "all")
            .append_pair("all_blocks", "true");
        url
    }

    /// URLs requested once the initial login succeeds
    pub fn start_urls(&self) -> Vec<Url> {
        vec![self.course_info_url()]
    }

    /// Login form body
    pub fn login_form(&self) -> Vec<(String, String)> {
        vec![
            ("email".to_string(), self.email.clone()),
            ("password".to_string(), self.password.clone()),
        ]
    }

    /// Returns true when `url` points at the HTML login page
    pub fn is_login_page(&self, url: &Url) -> bool {
        url.path() == LOGIN_PAGE_PATH
    }

    /// Returns true when `url` points at the login API
    pub fn is_login_api(&self, url: &Url) -> bool {
        url.path() == LOGIN_API_PATH
    }

    /// Resolves a `next` value (usually a site-relative path) against the site root
    pub fn resolve(&self, next: &str) -> Option<Url> {
        self.base_url.join(next).ok()
    }

    fn url_for(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }
}

impl fmt::Debug for CredentialSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSession")
            .field("base_url", &self.base_url.as_str())
            .field("email", &self.email)
            .field("password", &"***")
            .field("course_key", &self.course_key)
            .field("basic_auth", &self.basic_auth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteConfig {
        SiteConfig {
            domain: "courses.example.org".to_string(),
            scheme: "https".to_string(),
            course_key: "course-v1:edX+Test101+course".to_string(),
        }
    }

    fn credentials() -> CredentialsConfig {
        CredentialsConfig {
            email: Some("staff@example.org".to_string()),
            password: Some("edx".to_string()),
            http_user: None,
            http_pass: None,
        }
    }

    #[test]
    fn test_login_urls() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        assert_eq!(
            session.login_page_url().as_str(),
            "https://courses.example.org/login"
        );
        assert_eq!(
            session.login_api_url().as_str(),
            "https://courses.example.org/user_api/v1/account/login_session/"
        );
    }

    #[test]
    fn test_resume_login_url_carries_next() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        let url = session.resume_login_api_url("/courses/x/courseware/");
        assert_eq!(url.path(), LOGIN_API_PATH);
        assert_eq!(
            crate::url::query_param(&url, "next"),
            Some("/courses/x/courseware/".to_string())
        );
    }

    #[test]
    fn test_course_info_url() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        assert_eq!(
            session.course_info_url().as_str(),
            "https://courses.example.org/courses/course-v1:edX+Test101+course/info"
        );
        assert_eq!(session.start_urls(), vec![session.course_info_url()]);
    }

    #[test]
    fn test_course_blocks_url() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        let url = session.course_blocks_url();
        assert_eq!(url.path(), COURSE_BLOCKS_API_PATH);
        assert_eq!(
            crate::url::query_param(&url, "course_id"),
            Some("course-v1:edX+Test101+course".to_string())
        );
        assert_eq!(crate::url::query_param(&url, "depth"), Some("all".to_string()));
        assert_eq!(
            crate::url::query_param(&url, "all_blocks"),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_login_form() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        assert_eq!(
            session.login_form(),
            vec![
                ("email".to_string(), "staff@example.org".to_string()),
                ("password".to_string(), "edx".to_string()),
            ]
        );
    }

    #[test]
    fn test_has_credentials() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        assert!(session.has_credentials());

        let empty = CredentialsConfig {
            email: Some(String::new()),
            password: Some(String::new()),
            ..credentials()
        };
        let session = CredentialSession::new(&site(), &empty).unwrap();
        assert!(!session.has_credentials());

        let no_password = CredentialsConfig {
            password: None,
            ..credentials()
        };
        let session = CredentialSession::new(&site(), &no_password).unwrap();
        assert!(!session.has_credentials());
    }

    #[test]
    fn test_basic_auth() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        assert!(session.basic_auth().is_none());

        let gated = CredentialsConfig {
            http_user: Some("gate".to_string()),
            http_pass: Some("secret".to_string()),
            ..credentials()
        };
        let session = CredentialSession::new(&site(), &gated).unwrap();
        assert_eq!(
            session.basic_auth(),
            Some(&BasicAuth {
                user: "gate".to_string(),
                pass: Some("secret".to_string()),
            })
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        let debug = format!("{:?}", session);
        assert!(!debug.contains("\"edx\""));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_domain_with_port() {
        let mut site = site();
        site.domain = "127.0.0.1:8000".to_string();
        site.scheme = "http".to_string();
        let session = CredentialSession::new(&site, &credentials()).unwrap();
        assert_eq!(session.site_host(), "127.0.0.1");
        assert_eq!(session.login_page_url().as_str(), "http://127.0.0.1:8000/login");
    }

    #[test]
    fn test_resolve_relative_next() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        assert_eq!(
            session.resolve("/courses/x/progress").map(|u| u.to_string()),
            Some("https://courses.example.org/courses/x/progress".to_string())
        );
    }

    #[test]
    fn test_is_login_page() {
        let session = CredentialSession::new(&site(), &credentials()).unwrap();
        let url = Url::parse("https://courses.example.org/login?next=%2Fcourses").unwrap();
        assert!(session.is_login_page(&url));
        assert!(!session.is_login_page(&session.course_info_url()));
    }
}
