//! Link policy and crawl frontier
//!
//! The link policy decides which of a page's outgoing links are worth crawling.
//! The frontier remembers every URL that was ever enqueued or visited so that
//! each page is fetched and recorded at most once.

use crate::auth::LOGIN_PAGE_PATH;
use crate::url::{frontier_key, is_on_site};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Path fragment of logout links
pub const LOGOUT_PATH_PATTERN: &str = "/logout/";

/// Path fragment of embedded interactive content, which is not crawlable on its own
pub const XBLOCK_PATH_PATTERN: &str = "/xblock/";

/// Query parameter value requesting an archive export
pub const ARCHIVE_ACCEPT_VALUE: &str = "application/x-tgz";

/// File extensions of non-page resources
const NON_PAGE_EXTENSIONS: &[&str] = &[
    "7z", "avi", "bmp", "css", "csv", "doc", "docx", "exe", "gif", "gz", "ico", "jpeg", "jpg",
    "js", "m4a", "mov", "mp3", "mp4", "ogg", "pdf", "png", "ppt", "pptx", "rar", "srt", "svg",
    "tar", "tgz", "wav", "webm", "webp", "xls", "xlsx", "zip",
];

/// Why a link is not followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusion {
    /// Following it would end the session
    Logout,
    /// The login page, reached through the site's own "Sign in" links
    LoginPage,
    /// Embedded interactive sub-resource
    EmbeddedContent,
    /// Requests an archive export
    Archive,
    /// Points at a file rather than a page
    NonPage,
    /// Leaves the crawled site
    Offsite,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Logout => "logout link",
            Self::LoginPage => "login page",
            Self::EmbeddedContent => "embedded content",
            Self::Archive => "archive export",
            Self::NonPage => "non-page resource",
            Self::Offsite => "offsite",
        };
        write!(f, "{}", reason)
    }
}

/// Decides which outgoing links of a page get crawled
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    site_host: String,
}

impl LinkPolicy {
    /// Creates a policy for the site whose host is `site_host`
    pub fn new(site_host: impl Into<String>) -> Self {
        Self {
            site_host: site_host.into(),
        }
    }

    /// Returns the reason `url` must not be crawled, if any
    pub fn exclusion(&self, url: &Url) -> Option<Exclusion> {
        let path = url.path();

        if path.contains(LOGOUT_PATH_PATTERN) {
            return Some(Exclusion::Logout);
        }

        if path.trim_end_matches('/') == LOGIN_PAGE_PATH {
            return Some(Exclusion::LoginPage);
        }

        if path.contains(XBLOCK_PATH_PATTERN) {
            return Some(Exclusion::EmbeddedContent);
        }

        if requests_archive(url) {
            return Some(Exclusion::Archive);
        }

        if has_non_page_extension(path) {
            return Some(Exclusion::NonPage);
        }

        match url.host_str() {
            Some(host) if is_on_site(&self.site_host, host) => None,
            _ => Some(Exclusion::Offsite),
        }
    }

    /// Selects the links of one page that should be enqueued
    ///
    /// Drops excluded links, links seen earlier on the same page and links the
    /// frontier already knows. The result keeps source order.
    ///
    /// # Returns
    ///
    /// The eligible links plus how many links were excluded by rule
    pub fn select(&self, links: &[String], frontier: &Frontier) -> (Vec<Url>, u64) {
        let mut seen_on_page = HashSet::new();
        let mut selected = Vec::new();
        let mut excluded = 0;

        for link in links {
            let Ok(url) = Url::parse(link) else {
                tracing::debug!("Skipping unparsable link {}", link);
                continue;
            };

            if let Some(reason) = self.exclusion(&url) {
                tracing::trace!("Excluding {} ({})", url, reason);
                excluded += 1;
                continue;
            }

            let key = frontier_key(url.as_str());
            if frontier.contains(&key) || !seen_on_page.insert(key) {
                continue;
            }

            selected.push(url);
        }

        (selected, excluded)
    }
}

fn requests_archive(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, value)| key == "_accept" && value == ARCHIVE_ACCEPT_VALUE)
}

fn has_non_page_extension(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or_default();

    match last_segment.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            NON_PAGE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// Every URL the crawl has enqueued or visited
///
/// Keys are normalized URLs. The frontier is owned by the engine's event loop,
/// so `insert_if_absent` is a single check-and-set with no window between the
/// check and the insert.
#[derive(Debug, Default)]
pub struct Frontier {
    discovered: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `url` unless it was enqueued or visited before
    ///
    /// # Returns
    ///
    /// * `true` - The URL is new and is now pending
    /// * `false` - The URL was already known
    pub fn insert_if_absent(&mut self, url: &str) -> bool {
        let key = frontier_key(url);
        if self.visited.contains(&key) {
            return false;
        }
        self.discovered.insert(key)
    }

    /// Marks `url` as visited
    ///
    /// # Returns
    ///
    /// * `true` - First visit of this URL
    /// * `false` - The URL had already been visited
    pub fn mark_visited(&mut self, url: &str) -> bool {
        let key = frontier_key(url);
        self.discovered.remove(&key);
        self.visited.insert(key)
    }

    /// Returns true if the normalized key is pending or visited
    pub fn contains(&self, key: &str) -> bool {
        self.discovered.contains(key) || self.visited.contains(key)
    }

    /// Returns true if `url` was visited
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&frontier_key(url))
    }

    /// Number of URLs enqueued but not yet visited
    pub fn pending_len(&self) -> usize {
        self.discovered.len()
    }

    /// Number of visited URLs
    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}
