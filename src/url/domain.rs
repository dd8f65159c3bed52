use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use course_spider::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether `candidate` belongs to the crawled site
///
/// A host is on the site when it equals the site host or is any subdomain of it,
/// so `lms.example.org` accepts `lms.example.org` and `preview.lms.example.org`
/// but not `example.org` or `notlms.example.org`. Both sides are compared
/// case-insensitively.
///
/// # Examples
///
/// ```
/// use course_spider::url::is_on_site;
///
/// assert!(is_on_site("lms.example.org", "lms.example.org"));
/// assert!(is_on_site("lms.example.org", "preview.lms.example.org"));
/// assert!(!is_on_site("lms.example.org", "example.org"));
/// ```
pub fn is_on_site(site_host: &str, candidate: &str) -> bool {
    if site_host.is_empty() || candidate.is_empty() {
        return false;
    }

    let site = site_host.to_lowercase();
    let candidate = candidate.to_lowercase();

    candidate == site || candidate.ends_with(&format!(".{}", site))
}
