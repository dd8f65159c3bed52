//! URL handling module for Course-Spider
//!
//! This module provides the URL normalization used as the crawl dedup key and
//! the host matching used to keep the crawl on the configured site.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_on_site};
pub use normalize::{frontier_key, normalize_url};

use url::Url;

/// Returns the value of the first query parameter named `name`, decoded
///
/// # Examples
///
/// ```
/// use url::Url;
/// use course_spider::url::query_param;
///
/// let url = Url::parse("https://example.com/login?next=%2Fcourses%2Fx").unwrap();
/// assert_eq!(query_param(&url, "next"), Some("/courses/x".to_string()));
/// assert_eq!(query_param(&url, "missing"), None);
/// ```
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
