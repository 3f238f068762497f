//! Endpoint URL helpers.

/// Join a provider base URL and an endpoint path with exactly one slash.
///
/// ```
/// use senren::utils::url::endpoint_url;
///
/// assert_eq!(
///     endpoint_url("https://api.deepseek.com/v1/", "/chat/completions"),
///     "https://api.deepseek.com/v1/chat/completions"
/// );
/// ```
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
