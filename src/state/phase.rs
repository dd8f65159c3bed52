//! Phase definitions for the authenticated crawl
//!
//! The phase belongs to the crawl as a whole, not to individual pages.

use std::fmt;

/// Represents where the crawl is in its authentication cycle
///
/// ```text
/// NotStarted -> AwaitingCsrfForInitialLogin -> AwaitingInitialLoginResult -> Crawling
/// Crawling -> AwaitingCsrfForReAuth -> AwaitingReAuthResult -> Crawling
/// any handshake phase -> Halted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing has been requested yet
    NotStarted,

    // ===== Initial login =====
    /// Waiting for the login page that carries the CSRF cookie
    AwaitingCsrfForInitialLogin,

    /// Waiting for the answer to the first login form submission
    AwaitingInitialLoginResult,

    // ===== Authenticated =====
    /// Logged in; ordinary page visits happen only here
    Crawling,

    // ===== Re-authentication =====
    /// Logged out mid-crawl, waiting for a fresh CSRF cookie
    AwaitingCsrfForReAuth,

    /// Waiting for the answer to the re-authentication form submission
    AwaitingReAuthResult,

    // ===== Terminal =====
    /// The crawl stopped issuing requests (credentials rejected or handshake broken)
    Halted,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        matches!(
            (self, next),
            (NotStarted, AwaitingCsrfForInitialLogin)
                | (AwaitingCsrfForInitialLogin, AwaitingInitialLoginResult)
                | (AwaitingInitialLoginResult, Crawling)
                | (Crawling, AwaitingCsrfForReAuth)
                | (AwaitingCsrfForReAuth, AwaitingReAuthResult)
                | (AwaitingReAuthResult, Crawling)
                | (AwaitingCsrfForInitialLogin, Halted)
                | (AwaitingInitialLoginResult, Halted)
                | (AwaitingCsrfForReAuth, Halted)
                | (AwaitingReAuthResult, Halted)
        )
    }

    /// Returns true while a login or re-authentication handshake is in flight
    pub fn is_handshake(&self) -> bool {
        self.is_initial_login() || self.is_reauthenticating()
    }

    /// Returns true during the first login
    pub fn is_initial_login(&self) -> bool {
        matches!(
            self,
            Self::AwaitingCsrfForInitialLogin | Self::AwaitingInitialLoginResult
        )
    }

    /// Returns true while recovering from an unexpected logout
    pub fn is_reauthenticating(&self) -> bool {
        matches!(
            self,
            Self::AwaitingCsrfForReAuth | Self::AwaitingReAuthResult
        )
    }

    /// Returns true once the crawl will issue no more requests
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Halted)
    }

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::AwaitingCsrfForInitialLogin => "awaiting_csrf_for_initial_login",
            Self::AwaitingInitialLoginResult => "awaiting_initial_login_result",
            Self::Crawling => "crawling",
            Self::AwaitingCsrfForReAuth => "awaiting_csrf_for_reauth",
            Self::AwaitingReAuthResult => "awaiting_reauth_result",
            Self::Halted => "halted",
        }
    }

    /// Returns all phases
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::NotStarted,
            Self::AwaitingCsrfForInitialLogin,
            Self::AwaitingInitialLoginResult,
            Self::Crawling,
            Self::AwaitingCsrfForReAuth,
            Self::AwaitingReAuthResult,
            Self::Halted,
        ]
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
