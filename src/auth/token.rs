/// Name of the cookie carrying the anti-forgery token
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// Request header the login API expects the token in
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";

/// Extracts the CSRF token from a response's `Set-Cookie` header values
///
/// Only headers whose value begins with `csrftoken=` are considered. When the
/// server sets the cookie more than once in a response, the last one wins, the
/// same as a cookie jar would behave. The token runs up to the first `;` or
/// whitespace character.
///
/// # Returns
///
/// * `Some(token)` - The token from the last matching header
/// * `None` - No header sets the token cookie, or its value is empty
///
/// # Examples
///
/// ```
/// use course_spider::auth::extract_csrf_token;
///
/// let headers = ["sessionid=xyz; HttpOnly", "csrftoken=abc123; Path=/"];
/// assert_eq!(extract_csrf_token(headers), Some("abc123".to_string()));
/// assert_eq!(extract_csrf_token(["sessionid=xyz"]), None);
/// ```
pub fn extract_csrf_token<'a, I>(set_cookie_headers: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = format!("{}=", CSRF_COOKIE_NAME);

    let last = set_cookie_headers
        .into_iter()
        .filter(|header| header.starts_with(&prefix))
        .last()?;

    let value: String = last[prefix.len()..]
        .chars()
        .take_while(|c| *c != ';' && !c.is_whitespace())
        .collect();

    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
