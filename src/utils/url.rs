//! URL helpers for joining backend endpoints.
//!
//! Base URLs come from user configuration and frequently carry trailing
//! slashes; endpoints are joined here so no call site produces doubled
//! slashes or hand-built query strings.

/// Normalize a base URL by removing trailing slashes.
pub fn normalize_base_url(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Join a base URL and an endpoint path.
///
/// # Examples
///
/// ```
/// use ragline::utils::url::endpoint_url;
///
/// assert_eq!(
///     endpoint_url("http://localhost:8040/", "chatting_v2"),
///     "http://localhost:8040/chatting_v2"
/// );
/// ```
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}

/// Append query parameters to a URL. Pairs are percent-free on this backend
/// (numeric ids and short ASCII keywords), so values are appended verbatim.
pub fn with_query(url: &str, pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return url.to_string();
    }
    let query = pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}?{query}")
}
