//! Requests and responses exchanged between the spider and the fetch engine
//!
//! The spider never performs I/O. It describes what to fetch as `Request`s,
//! each naming the callback its `Response` must be routed to, and the engine
//! delivers the results back.

use reqwest::header::{HeaderMap, SET_COOKIE};
use std::collections::BTreeMap;
use url::Url;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// What to do once a login handshake succeeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// First login: fan out to every start URL
    StartUrls,

    /// Re-authentication: resume the page the crawler was redirected away from
    Resume {
        /// The `next` parameter of the login redirect, if there was one
        next: Option<String>,
    },
}

/// Which spider step handles a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// Login page fetched; extract the CSRF token and submit the login form
    Csrf(Continuation),

    /// Login form submitted; check the result and continue
    Login(Continuation),

    /// An ordinary crawled page
    Visit,
}

impl Callback {
    /// Returns true for the two steps of a login handshake
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Csrf(_) | Self::Login(_))
    }
}

/// An outgoing request
///
/// Every request implicitly carries the spider's failure handler as its error
/// callback; the engine routes transport failures there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
    pub callback: Callback,
    /// Skip the frontier's duplicate check (handshakes and resumed pages)
    pub dont_filter: bool,
}

impl Request {
    /// Creates a `GET` request
    pub fn get(url: Url, callback: Callback) -> Self {
        let dont_filter = callback.is_handshake();
        Self {
            url,
            method: Method::Get,
            headers: Vec::new(),
            form: None,
            callback,
            dont_filter,
        }
    }

    /// Creates a form `POST` request
    pub fn form(url: Url, form: Vec<(String, String)>, callback: Callback) -> Self {
        Self {
            url,
            method: Method::Post,
            headers: Vec::new(),
            form: Some(form),
            callback,
            dont_filter: true,
        }
    }

    /// Adds a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Marks the request as exempt from duplicate filtering
    pub fn dont_filter(mut self) -> Self {
        self.dont_filter = true;
        self
    }

    /// Returns the value of the first header named `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A fetched response
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL, after redirects
    pub url: Url,
    /// URL the request was sent to
    pub requested_url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Headers the request was sent with
    pub request_headers: BTreeMap<String, String>,
}

impl Response {
    /// Path of the final URL
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Values of every `Set-Cookie` header, in order
    pub fn set_cookie_values(&self) -> Vec<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// Returns the first query parameter of the final URL named `name`
    pub fn query_param(&self, name: &str) -> Option<String> {
        crate::url::query_param(&self.url, name)
    }
}
