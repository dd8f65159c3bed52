//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client (user agent, timeouts, redirects, cookie jar)
//! - Executing spider requests, with basic auth when configured
//! - Recording the headers each request was sent with
//! - Classifying failures into HTTP, name-resolution and other errors

use crate::auth::BasicAuth;
use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::request::{Callback, Method, Request, Response};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed per request
pub const MAX_REDIRECTS: usize = 10;

/// Why a request produced no usable response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The server answered with a non-success status
    #[error("HTTP {status} on {url}")]
    Http { status: u16, url: String },

    /// The host could not be resolved
    #[error("DNS lookup failed for {host} ({url})")]
    NameResolution { host: String, url: String },

    /// Anything else: refused connection, timeout, TLS, unreadable body
    #[error("Request to {url} failed: {cause}")]
    Other { url: String, cause: String },
}

/// Formats the user agent string: `CrawlerName/Version`
pub fn user_agent(config: &UserAgentConfig) -> String {
    format!("{}/{}", config.crawler_name, config.crawler_version)
}

/// Builds an HTTP client with proper configuration
///
/// The client follows up to [`MAX_REDIRECTS`] redirects so that a page the
/// site bounces to the login page arrives with the login URL as its final URL.
/// Cookies are kept in `jar` for the whole crawl.
///
/// # Example
///
/// ```no_run
/// use course_spider::config::{CrawlerConfig, UserAgentConfig};
/// use course_spider::crawler::build_http_client;
/// use reqwest::cookie::Jar;
/// use std::sync::Arc;
///
/// let client = build_http_client(
///     &UserAgentConfig::default(),
///     &CrawlerConfig::default(),
///     Arc::new(Jar::default()),
/// )
/// .unwrap();
/// ```
pub fn build_http_client(
    user_agent_config: &UserAgentConfig,
    crawler_config: &CrawlerConfig,
    jar: Arc<Jar>,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent(user_agent_config))
        .timeout(Duration::from_secs(crawler_config.request_timeout))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .cookie_provider(jar)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Executes spider requests against the site
///
/// Cheap to clone; clones share the client and the cookie jar.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    jar: Arc<Jar>,
    user_agent: String,
    basic_auth: Option<BasicAuth>,
}

impl Fetcher {
    /// Creates a fetcher with a fresh cookie jar
    pub fn new(
        user_agent_config: &UserAgentConfig,
        crawler_config: &CrawlerConfig,
        basic_auth: Option<BasicAuth>,
    ) -> Result<Self, reqwest::Error> {
        let jar = Arc::new(Jar::default());
        let client = build_http_client(user_agent_config, crawler_config, Arc::clone(&jar))?;

        Ok(Self {
            client,
            jar,
            user_agent: user_agent(user_agent_config),
            basic_auth,
        })
    }

    /// Fetches `request`
    ///
    /// Non-success statuses are failures, except for login form submissions:
    /// those always reach the spider, which reads the verdict from the body.
    pub async fn fetch(&self, request: &Request) -> Result<Response, FetchFailure> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        if let Some(auth) = &self.basic_auth {
            builder = builder.basic_auth(&auth.user, auth.pass.as_ref());
        }

        let built = builder
            .build()
            .map_err(|e| classify_error(&request.url, &e))?;
        let request_headers = self.sent_headers(&built);

        tracing::debug!("{:?} {}", request.method, request.url);

        let response = self
            .client
            .execute(built)
            .await
            .map_err(|e| classify_error(&request.url, &e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() && !matches!(request.callback, Callback::Login(_)) {
            return Err(FetchFailure::Http {
                status: status.as_u16(),
                url: final_url.to_string(),
            });
        }

        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&final_url, &e))?;

        Ok(Response {
            url: final_url,
            requested_url: request.url.clone(),
            status: status.as_u16(),
            headers,
            body,
            request_headers,
        })
    }

    /// Snapshot of the headers a request goes out with
    ///
    /// The client adds the user agent and the jar's cookies at send time, so
    /// both are filled in here. Authorization is left out of the snapshot.
    fn sent_headers(&self, request: &reqwest::Request) -> BTreeMap<String, String> {
        let mut headers: BTreeMap<String, String> = request
            .headers()
            .iter()
            .filter(|(name, _)| **name != AUTHORIZATION)
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        headers
            .entry(USER_AGENT.as_str().to_string())
            .or_insert_with(|| self.user_agent.clone());

        if let Some(cookie) = self
            .jar
            .cookies(request.url())
            .and_then(|value| value.to_str().ok().map(str::to_string))
        {
            headers.insert(COOKIE.as_str().to_string(), cookie);
        }

        headers
    }
}

/// Classifies a transport error
///
/// reqwest does not expose resolver failures as their own kind, so the error's
/// source chain is searched for the resolver's message.
pub fn classify_error(url: &Url, error: &reqwest::Error) -> FetchFailure {
    if is_name_resolution_error(error) {
        return FetchFailure::NameResolution {
            host: url.host_str().unwrap_or_default().to_string(),
            url: url.to_string(),
        };
    }

    FetchFailure::Other {
        url: url.to_string(),
        cause: error_chain(error),
    }
}

fn is_name_resolution_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        let message = err.to_string().to_ascii_lowercase();
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return true;
        }
        current = err.source();
    }
    false
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut current = error.source();
    while let Some(err) = current {
        parts.push(err.to_string());
        current = err.source();
    }
    parts.join(": ")
}
