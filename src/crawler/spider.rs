//! Crawl state machine
//!
//! The spider owns the credential session and the crawl phase. It never does
//! I/O: the engine feeds it responses and failures, and it answers with new
//! requests and page records. The initial login and every re-authentication
//! run through the same two handshake steps, parameterized by a
//! [`Continuation`] that says what to do once the login succeeds.

use crate::auth::{
    extract_csrf_token, AuthError, CredentialSession, CREDENTIALS_HINT, CSRF_HEADER_NAME,
    LOGIN_FAILURE_MSG,
};
use crate::config::Config;
use crate::crawler::fetcher::FetchFailure;
use crate::crawler::parser::extract_title;
use crate::crawler::request::{Callback, Continuation, Request, Response};
use crate::output::PageRecord;
use crate::state::CrawlPhase;
use crate::SpiderError;
use std::collections::HashMap;

/// Something the spider wants the engine to act on
#[derive(Debug, Clone, PartialEq)]
pub enum SpiderOutput {
    /// Fetch this
    Request(Request),
    /// Record this page and follow its links
    Record(PageRecord),
}

impl SpiderOutput {
    /// Returns the request, if this output is one
    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Self::Request(request) => Some(request),
            Self::Record(_) => None,
        }
    }

    /// Returns the record, if this output is one
    pub fn as_record(&self) -> Option<&PageRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Request(_) => None,
        }
    }
}

/// The authenticated crawl state machine
#[derive(Debug)]
pub struct Spider {
    session: CredentialSession,
    phase: CrawlPhase,
    /// `next` targets of pages that hit the login page while a re-auth was running
    pending_resumes: Vec<Option<String>>,
    /// Re-authentications started per interrupted URL
    reauth_attempts: HashMap<String, u32>,
    max_reauth_attempts: u32,
    reauthentications: u64,
}

impl Spider {
    /// Creates a spider that has not requested anything yet
    pub fn new(session: CredentialSession, max_reauth_attempts: u32) -> Self {
        Self {
            session,
            phase: CrawlPhase::NotStarted,
            pending_resumes: Vec::new(),
            reauth_attempts: HashMap::new(),
            max_reauth_attempts,
            reauthentications: 0,
        }
    }

    /// Creates a spider from a full configuration
    pub fn from_config(config: &Config) -> Result<Self, SpiderError> {
        let session = CredentialSession::from_config(config)?;
        Ok(Self::new(session, config.crawler.max_reauth_attempts))
    }

    /// Current crawl phase
    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// The credential session
    pub fn session(&self) -> &CredentialSession {
        &self.session
    }

    /// Number of re-authentications started so far
    pub fn reauthentications(&self) -> u64 {
        self.reauthentications
    }

    /// Number of interrupted pages waiting for the running re-authentication
    pub fn pending_resumes(&self) -> usize {
        self.pending_resumes.len()
    }

    /// Returns true once the crawl will issue no more requests
    pub fn is_halted(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Starts the crawl
    ///
    /// # Returns
    ///
    /// * `Ok(requests)` - A single request for the login page
    /// * `Err(SpiderError::Auth(AuthError::MissingCredentials))` - Email or password
    ///   is missing; nothing is requested and the phase stays `NotStarted`
    pub fn begin(&mut self) -> Result<Vec<Request>, SpiderError> {
        if !self.session.has_credentials() {
            return Err(AuthError::MissingCredentials.into());
        }

        self.transition(CrawlPhase::AwaitingCsrfForInitialLogin)?;
        tracing::info!("Fetching CSRF token from {}", self.session.login_page_url());

        Ok(vec![Request::get(
            self.session.login_page_url(),
            Callback::Csrf(Continuation::StartUrls),
        )])
    }

    /// Routes a successful response to the step its request named
    pub fn handle_response(
        &mut self,
        callback: &Callback,
        response: &Response,
    ) -> Result<Vec<SpiderOutput>, SpiderError> {
        if self.is_halted() {
            tracing::debug!("Crawl halted, ignoring response from {}", response.url);
            return Ok(Vec::new());
        }

        match callback {
            Callback::Csrf(continuation) => self.after_csrf(continuation, response),
            Callback::Login(continuation) => self.after_login(continuation, response),
            Callback::Visit => self.visit_page(response),
        }
    }

    /// Error callback shared by every request
    ///
    /// Logs the failure with its context. A failed page fetch only loses that
    /// page; a failed handshake request halts the crawl, since nothing can be
    /// fetched without a session.
    pub fn handle_failure(&mut self, request: &Request, failure: &FetchFailure) {
        log_failure(failure);

        if request.callback.is_handshake() && self.phase.is_handshake() {
            tracing::error!("Login handshake failed during {}, stopping crawl", self.phase);
            self.halt();
        }
    }

    /// CSRF step of a handshake: submit the login form with the fresh token
    fn after_csrf(
        &mut self,
        continuation: &Continuation,
        response: &Response,
    ) -> Result<Vec<SpiderOutput>, SpiderError> {
        let cookies = response.set_cookie_values();
        if cookies.is_empty() {
            self.halt();
            return Err(AuthError::NoCookies {
                url: response.url.to_string(),
            }
            .into());
        }

        let token = extract_csrf_token(cookies);
        if token.is_none() {
            tracing::warn!(
                "No CSRF token in cookies from {}, submitting login without one",
                response.url
            );
        }

        let login_url = match continuation {
            Continuation::Resume { next: Some(next) } => self.session.resume_login_api_url(next),
            _ => self.session.login_api_url(),
        };

        let mut request = Request::form(
            login_url,
            self.session.login_form(),
            Callback::Login(continuation.clone()),
        )
        .with_header("Referer", self.session.login_page_url().as_str());

        if let Some(token) = token {
            request = request.with_header(CSRF_HEADER_NAME, token);
        }

        let next_phase = match continuation {
            Continuation::StartUrls => CrawlPhase::AwaitingInitialLoginResult,
            Continuation::Resume { .. } => CrawlPhase::AwaitingReAuthResult,
        };
        self.transition(next_phase)?;

        tracing::debug!("Submitting login form to {}", request.url);
        Ok(vec![SpiderOutput::Request(request)])
    }

    /// Login step of a handshake: check the verdict and continue the crawl
    fn after_login(
        &mut self,
        continuation: &Continuation,
        response: &Response,
    ) -> Result<Vec<SpiderOutput>, SpiderError> {
        let on_login_api = self.session.is_login_api(&response.url);
        if login_rejected(response, on_login_api) {
            let error = AuthError::Rejected {
                url: response.url.to_string(),
            };
            tracing::error!("{} (status {}). {}", error, response.status, CREDENTIALS_HINT);
            self.transition(CrawlPhase::Halted)?;
            return Ok(Vec::new());
        }

        self.transition(CrawlPhase::Crawling)?;

        match continuation {
            Continuation::StartUrls => {
                tracing::info!("Successfully completed initial login");
                Ok(self
                    .session
                    .start_urls()
                    .into_iter()
                    .map(|url| SpiderOutput::Request(Request::get(url, Callback::Visit)))
                    .collect())
            }
            Continuation::Resume { next } => {
                tracing::info!("Re-authenticated, resuming crawl");
                let mut outputs = Vec::new();

                if on_login_api {
                    // The login API answered in place instead of redirecting to `next`
                    match self.resume(next.as_deref()) {
                        Some(output) => outputs.push(output),
                        None => tracing::warn!("Re-authenticated but no interrupted page to resume"),
                    }
                } else if !is_success(response.status) {
                    log_failure(&FetchFailure::Http {
                        status: response.status,
                        url: response.url.to_string(),
                    });
                } else {
                    outputs.extend(self.visit_page(response)?);
                }

                for pending in std::mem::take(&mut self.pending_resumes) {
                    outputs.extend(self.resume(pending.as_deref()));
                }

                Ok(outputs)
            }
        }
    }

    /// Handles an ordinary crawled page
    fn visit_page(&mut self, response: &Response) -> Result<Vec<SpiderOutput>, SpiderError> {
        if self.session.is_login_page(&response.url) {
            return self.reauthenticate(response);
        }

        let record = PageRecord::new(
            response.url.as_str(),
            response.request_headers.clone(),
            extract_title(&response.body),
        );

        Ok(vec![SpiderOutput::Record(record)])
    }

    /// Starts a re-authentication after the site redirected a page to the login page
    ///
    /// Without a `next` parameter the originally requested URL is resumed.
    fn reauthenticate(&mut self, response: &Response) -> Result<Vec<SpiderOutput>, SpiderError> {
        let requested = &response.requested_url;
        let next = response.query_param("next").or_else(|| {
            (!self.session.is_login_page(requested) && !self.session.is_login_api(requested))
                .then(|| requested.to_string())
        });
        let target = next.clone().unwrap_or_default();

        let attempts = self.reauth_attempts.entry(target.clone()).or_insert(0);
        *attempts += 1;
        if *attempts > self.max_reauth_attempts {
            let error = AuthError::ReauthLimit {
                url: target,
                attempts: self.max_reauth_attempts,
            };
            tracing::error!("{}, dropping it", error);
            return Ok(Vec::new());
        }

        if self.phase.is_reauthenticating() {
            tracing::debug!("Re-authentication already running, queueing {:?}", next);
            self.pending_resumes.push(next);
            return Ok(Vec::new());
        }

        self.transition(CrawlPhase::AwaitingCsrfForReAuth)?;
        self.reauthentications += 1;
        tracing::warn!(
            "Unexpectedly logged out while fetching {}, logging back in",
            next.as_deref().unwrap_or("an unknown page")
        );

        Ok(vec![SpiderOutput::Request(Request::get(
            self.session.login_page_url(),
            Callback::Csrf(Continuation::Resume { next }),
        ))])
    }

    /// Re-requests an interrupted page, bypassing the duplicate filter
    fn resume(&self, next: Option<&str>) -> Option<SpiderOutput> {
        let next = next?;
        match self.session.resolve(next) {
            Some(url) => Some(SpiderOutput::Request(
                Request::get(url, Callback::Visit).dont_filter(),
            )),
            None => {
                tracing::warn!("Cannot resume unparsable next URL {}", next);
                None
            }
        }
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), SpiderError> {
        if !self.phase.can_transition_to(next) {
            return Err(SpiderError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        tracing::debug!("Phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    fn halt(&mut self) {
        if self.phase.can_transition_to(CrawlPhase::Halted) {
            self.phase = CrawlPhase::Halted;
        }
    }
}

/// The site refused the credentials
///
/// The failure phrase in the body is the primary signal. A non-success status
/// counts only while the final URL is still the login API; once the login
/// redirected to the resumed page, the status belongs to that page.
fn login_rejected(response: &Response, on_login_api: bool) -> bool {
    response.body.contains(LOGIN_FAILURE_MSG) || (on_login_api && !is_success(response.status))
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn log_failure(failure: &FetchFailure) {
    match failure {
        FetchFailure::Http { status, url } => {
            tracing::error!("HTTP error {} on {}", status, url);
            if matches!(status, 401 | 403) {
                tracing::error!("{}", CREDENTIALS_HINT);
            }
        }
        FetchFailure::NameResolution { host, url } => {
            tracing::error!("DNS lookup failed for {} while fetching {}", host, url);
        }
        FetchFailure::Other { url, cause } => {
            tracing::error!("Request to {} failed: {}", url, cause);
        }
    }
}
