//! Authentication support for the crawl
//!
//! This module contains the pieces of the login handshake that need no network:
//! - `token`: pulling the CSRF token out of `Set-Cookie` headers
//! - `session`: building the login, login-API and seed URLs plus the login form

mod session;
mod token;

pub use session::{
    BasicAuth, CredentialSession, COURSE_BLOCKS_API_PATH, LOGIN_API_PATH, LOGIN_FAILURE_MSG,
    LOGIN_PAGE_PATH,
};
pub use token::{extract_csrf_token, CSRF_COOKIE_NAME, CSRF_HEADER_NAME};

use thiserror::Error;

/// Hint logged whenever the server refuses the configured credentials
pub const CREDENTIALS_HINT: &str =
    "Credentials failed. Either add/update the current credentials or check the account on the site";

/// Authentication failures surfaced by the crawl state machine
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credentials: both an email and a password are required to log in")]
    MissingCredentials,

    #[error("Login page {url} set no cookies, cannot obtain a CSRF token")]
    NoCookies { url: String },

    #[error("Login rejected by {url}")]
    Rejected { url: String },

    #[error("Gave up re-authenticating for {url} after {attempts} attempts")]
    ReauthLimit { url: String, attempts: u32 },
}
