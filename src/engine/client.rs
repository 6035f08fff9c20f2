//! GitHub API transport
//!
//! Issues authenticated GET requests and classifies each response into the
//! engine's failure taxonomy. Retry policy lives in the pager, not here.

use chrono::{DateTime, Utc};
use core::time::Duration;
use reqwest::header::{HeaderMap, RETRY_AFTER};

const LOG_TARGET: &str = " transport";

/// Per-request timeout applied at the HTTP client level.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Backoff assumed when a rate-limited response carries no reset signal.
const NO_SIGNAL_BACKOFF_SECS: i64 = 60;

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

/// Classified result of a single API call
#[derive(Debug)]
pub enum ApiResult<T> {
    /// Request succeeded - contains data and optional rate limit info
    Success(T, Option<RateLimitInfo>),

    /// Rate limited (403/429 with a reset signal) - retryable after the reset time
    RateLimited(RateLimitInfo),

    /// The requested resource was not found (404)
    NotFound(Option<RateLimitInfo>),

    /// Credentials rejected (401, or 403 without rate-limit semantics)
    Unauthorized(Option<RateLimitInfo>),

    /// The response body did not decode as expected
    Malformed(String, Option<RateLimitInfo>),

    /// Transport-level failure (network unavailable, timeout, unexpected status)
    Failed(ohno::AppError, Option<RateLimitInfo>),
}

/// GitHub REST client
#[derive(Debug, Clone)]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a new API client with an optional bearer token and base URL.
    pub fn new(token: Option<&str>, base_url: impl Into<String>) -> crate::Result<Self> {
        use reqwest::header::{AUTHORIZATION, HeaderValue};

        let mut builder = reqwest::Client::builder()
            .user_agent("contrib-rank")
            .timeout(REQUEST_TIMEOUT);

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);

            let mut headers = HeaderMap::new();
            let _ = headers.insert(AUTHORIZATION, auth_val);

            builder = builder.default_headers(headers);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
        })
    }

    /// Get the base URL for this client
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET request and classify the response.
    pub async fn get(&self, url: &str) -> ApiResult<reqwest::Response> {
        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Request to {url} failed: {e:#}");
                return ApiResult::Failed(e.into(), None);
            }
        };

        let rate_limit = extract_rate_limit(resp.headers());
        let retry_after = parse_retry_after(resp.headers());

        let status = resp.status();
        if status.is_success() {
            return ApiResult::Success(resp, rate_limit);
        }

        match status.as_u16() {
            401 => ApiResult::Unauthorized(rate_limit),
            403 | 429 => {
                // A 403 is only a rate limit when the response says so;
                // otherwise the credentials were rejected.
                let quota_exhausted = rate_limit.is_some_and(|rl| rl.remaining == 0);
                if status.as_u16() == 429 || quota_exhausted || retry_after.is_some() {
                    ApiResult::RateLimited(rate_limit_signal(rate_limit, retry_after))
                } else {
                    ApiResult::Unauthorized(rate_limit)
                }
            }
            404 => ApiResult::NotFound(rate_limit),
            _ => {
                let error = resp.error_for_status().expect_err("status is not successful at this point");
                ApiResult::Failed(error.into(), rate_limit)
            }
        }
    }
}

/// Resolve the reset time for a rate-limited response, preferring `Retry-After`
/// over the quota headers and falling back to a fixed default backoff.
fn rate_limit_signal(rate_limit: Option<RateLimitInfo>, retry_after: Option<u64>) -> RateLimitInfo {
    if let Some(secs) = retry_after {
        return RateLimitInfo {
            remaining: 0,
            reset_at: Utc::now() + chrono::Duration::seconds(secs.min(i64::MAX as u64) as i64),
        };
    }

    rate_limit.unwrap_or_else(|| RateLimitInfo {
        remaining: 0,
        reset_at: Utc::now() + chrono::Duration::seconds(NO_SIGNAL_BACKOFF_SECS),
    })
}

/// Extract rate limit information from API response headers
fn extract_rate_limit(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER).and_then(|h| h.to_str().ok())?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let rate_limit = extract_rate_limit(&headers).unwrap();

        assert_eq!(rate_limit.remaining, 4999);
        assert_eq!(rate_limit.reset_at.timestamp(), 1_704_067_200);
    }

    #[test]
    fn extract_rate_limit_missing_headers() {
        assert!(extract_rate_limit(&HeaderMap::new()).is_none());
    }

    #[test]
    fn extract_rate_limit_invalid_values() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("lots"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));
        assert!(extract_rate_limit(&headers).is_none());

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("soon"));
        assert!(extract_rate_limit(&headers).is_none());
    }

    #[test]
    fn parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), Some(120));
    }

    #[test]
    fn parse_retry_after_absent_or_http_date() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn rate_limit_signal_prefers_retry_after() {
        let headers_info = RateLimitInfo {
            remaining: 0,
            reset_at: DateTime::from_timestamp(0, 0).unwrap(),
        };

        let before = Utc::now();
        let signal = rate_limit_signal(Some(headers_info), Some(30));
        assert!(signal.reset_at >= before + chrono::Duration::seconds(29));
    }

    #[test]
    fn rate_limit_signal_defaults_without_headers() {
        let before = Utc::now();
        let signal = rate_limit_signal(None, None);
        assert!(signal.reset_at >= before + chrono::Duration::seconds(NO_SIGNAL_BACKOFF_SECS - 1));
        assert_eq!(signal.remaining, 0);
    }

    #[test]
    fn client_new_without_token() {
        let client = Client::new(None, "https://api.github.com").unwrap();
        assert_eq!(client.base_url(), "https://api.github.com");
    }

    #[test]
    fn client_new_with_token() {
        let client = Client::new(Some("test_token"), "https://api.github.com").unwrap();
        assert_eq!(client.base_url(), "https://api.github.com");
    }
}
