use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One successfully visited page
///
/// Created once per visited non-login page and never modified afterwards.
/// The request headers are the ones the page was fetched with, session cookie
/// included, so downstream tools can replay the authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Final URL of the page (after redirects)
    pub url: String,

    /// Headers sent with the request that produced the page
    pub request_headers: BTreeMap<String, String>,

    /// When the page was processed
    pub accessed_at: DateTime<Utc>,

    /// Trimmed text of the first `<title>` element
    pub page_title: Option<String>,
}

impl PageRecord {
    /// Creates a record stamped with the current time
    pub fn new(
        url: impl Into<String>,
        request_headers: BTreeMap<String, String>,
        page_title: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            request_headers,
            accessed_at: Utc::now(),
            page_title,
        }
    }
}
