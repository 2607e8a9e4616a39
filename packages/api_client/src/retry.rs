//! HTTP retry helpers for transient errors.
//!
//! Every backend call goes through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so each request gets
//! exponential backoff on transient failures and the same JSON checks.
//!
//! ```ignore
//! let body = retry::send_json(&policy, || client.get(&url).query(&params)).await?;
//! ```

use std::time::Duration;

use crate::ApiError;

/// Default number of retry attempts after the first try.
///
/// With the default 500ms base delay the backoff runs 1s, 2s, 4s, so a
/// dead backend is given up on after about 7 seconds of waiting.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay unit for the exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// How many times, and how patiently, to retry a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX))
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// Connection errors, timeouts, HTTP 429 and HTTP 5xx are retried up to
/// `policy.max_retries` times. Other 4xx responses are permanent.
///
/// # Errors
///
/// * [`ApiError::Http`] if the request fails after all retries
/// * [`ApiError::Status`] for a non-success status
/// * [`ApiError::NotJson`] if the response is not `application/json`
/// * [`ApiError::Decode`] if the body is not valid JSON
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    policy: &RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, ApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(policy, &build_request).await?;

    let url = response.url().to_string();
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if !is_json_content_type(content_type.as_deref()) {
        log::error!("Expected JSON response but got {content_type:?} from {url}");
        return Err(ApiError::NotJson { content_type, url });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|json_err| {
        log::error!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {json_err}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        ApiError::Decode {
            url,
            message: json_err.to_string(),
        }
    })
}

/// Core retry loop. Returns the first 2xx [`reqwest::Response`].
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    policy: &RetryPolicy,
    build_request: &F,
) -> Result<reqwest::Response, ApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(ApiError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                if is_accepted_status(status.as_u16()) {
                    return Ok(response);
                }

                let url = response.url().to_string();
                if is_retryable_status(status.as_u16()) && attempt < max_retries {
                    log::warn!("  HTTP {status} from {url}");
                    attempt += 1;
                    continue;
                }

                return Err(ApiError::Status {
                    status: status.as_u16(),
                    url,
                });
            }
        }
    }
}

/// Whether a response status counts as success. Only 2xx does; a 3xx
/// that reached this point was not followed and carries no data.
#[must_use]
pub const fn is_accepted_status(status: u16) -> bool {
    status >= 200 && status < 300
}

/// Whether a status is worth retrying: 429 and every 5xx.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    status == 429 || (status >= 500 && status < 600)
}

/// Whether a `Content-Type` header value denotes JSON.
#[must_use]
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.trim_start()
            .to_ascii_lowercase()
            .starts_with("application/json")
    })
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.len() > BODY_PREVIEW_LEN {
        let mut end = BODY_PREVIEW_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_rate_limits_and_server_errors_only() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn only_2xx_is_accepted() {
        assert!(is_accepted_status(200));
        assert!(is_accepted_status(204));
        assert!(!is_accepted_status(199));
        assert!(!is_accepted_status(301));
        assert!(!is_accepted_status(304));
        assert!(!is_accepted_status(404));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let policy = RetryPolicy::default();
        assert!(policy.delay(u32::MAX) >= policy.delay(16));
    }

    #[test]
    fn recognizes_json_content_types() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some(
            "application/json; charset=utf-8"
        )));
        assert!(!is_json_content_type(Some("text/html; charset=utf-8")));
        assert!(!is_json_content_type(None));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(BODY_PREVIEW_LEN);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.len() <= BODY_PREVIEW_LEN + 3);
    }
}
