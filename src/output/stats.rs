//! Crawl statistics
//!
//! Counters the engine keeps while crawling, logged once the crawl ends.

use crate::state::CrawlPhase;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Requests handed to the HTTP client
    pub requests_sent: u64,

    /// Page records written to the sink
    pub pages_recorded: u64,

    /// Pages reached a second time (e.g. through a redirect) and not recorded again
    pub duplicate_pages: u64,

    /// Links dropped by the link policy
    pub links_excluded: u64,

    /// Re-authentication handshakes started after an unexpected logout
    pub reauthentications: u64,

    /// Requests that failed with a non-success HTTP status
    pub http_failures: u64,

    /// Requests whose host could not be resolved
    pub dns_failures: u64,

    /// Requests that failed for any other reason
    pub other_failures: u64,

    /// Phase the crawl ended in
    pub final_phase: Option<CrawlPhase>,
}

impl CrawlStats {
    /// Creates a new empty set of counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of failed requests
    pub fn total_failures(&self) -> u64 {
        self.http_failures + self.dns_failures + self.other_failures
    }

    /// Returns true when the crawl ended because authentication failed
    pub fn halted(&self) -> bool {
        self.final_phase.is_some_and(|phase| phase.is_terminal())
    }

    /// Logs the statistics at info level
    pub fn log_summary(&self) {
        tracing::info!(
            "Crawl finished: {} pages recorded, {} requests sent, {} re-authentications",
            self.pages_recorded,
            self.requests_sent,
            self.reauthentications
        );
        tracing::info!(
            "Skipped: {} duplicate pages, {} excluded links",
            self.duplicate_pages,
            self.links_excluded
        );
        if self.total_failures() > 0 {
            tracing::warn!(
                "Failures: {} HTTP, {} DNS, {} other",
                self.http_failures,
                self.dns_failures,
                self.other_failures
            );
        }
        if let Some(phase) = self.final_phase {
            tracing::info!("Final phase: {}", phase);
        }
    }
}
