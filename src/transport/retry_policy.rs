use std::time::{Duration, SystemTime};

use http::header::RETRY_AFTER;

const RETRY_AFTER_MAX_SECS: u64 = 30;
const FAST_SECOND_RETRY: Duration = Duration::from_millis(10);

const RETRIABLE_TRANSPORT_NEEDLES: [&[u8]; 8] = [
    b"timed out",
    b"timeout",
    b"connection reset",
    b"connection aborted",
    b"broken pipe",
    b"connection refused",
    b"unexpected eof",
    b"stream closed",
];

// Dropped connections retry immediately on the first attempt.
const FAST_RETRY_NEEDLES: [&[u8]; 5] = [
    b"connection reset",
    b"connection aborted",
    b"broken pipe",
    b"unexpected eof",
    b"stream closed",
];

/// Bounded retry schedule for opening an upstream request.
///
/// Retries only ever happen before a response is handed to the caller, so a
/// stream that already started is never replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    #[must_use]
    pub fn should_retry_status(status: http::StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 503 | 529)
    }

    #[must_use]
    pub fn should_retry_transport(message: &str) -> bool {
        contains_any(message, &RETRIABLE_TRANSPORT_NEEDLES)
    }

    /// Exponential backoff capped at `backoff_max`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u32 << attempt.min(10);
        self.backoff_base
            .saturating_mul(multiplier)
            .min(self.backoff_max)
    }

    /// Delay before retrying a retriable status, honoring `Retry-After`.
    #[must_use]
    pub fn status_delay(&self, headers: &http::HeaderMap, attempt: u32) -> Duration {
        parse_retry_after(headers).unwrap_or_else(|| self.backoff(attempt))
    }

    /// Delay before retrying a transport failure.
    #[must_use]
    pub fn transport_delay(&self, message: &str, attempt: u32) -> Duration {
        if contains_any(message, &FAST_RETRY_NEEDLES) {
            return if attempt == 0 {
                Duration::ZERO
            } else {
                FAST_SECOND_RETRY
            };
        }
        self.backoff(attempt)
    }
}

fn contains_any(message: &str, needles: &[&[u8]]) -> bool {
    let haystack = message.as_bytes();
    needles.iter().any(|needle| {
        haystack.len() >= needle.len()
            && haystack
                .windows(needle.len())
                .any(|window| window.eq_ignore_ascii_case(needle))
    })
}

/// Parse `Retry-After` as either delta-seconds or an HTTP date, capped.
#[must_use]
pub fn parse_retry_after(headers: &http::HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    let cap = Duration::from_secs(RETRY_AFTER_MAX_SECS);

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(cap));
    }

    let target = httpdate::parse_http_date(raw).ok()?;
    let delay = target.duration_since(SystemTime::now()).unwrap_or_default();
    Some(delay.min(cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_statuses() {
        assert!(RetryPolicy::should_retry_status(
            http::StatusCode::TOO_MANY_REQUESTS
        ));
        assert!(RetryPolicy::should_retry_status(
            http::StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(RetryPolicy::should_retry_status(
            http::StatusCode::from_u16(529).unwrap()
        ));
        assert!(!RetryPolicy::should_retry_status(
            http::StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(!RetryPolicy::should_retry_status(
            http::StatusCode::UNAUTHORIZED
        ));
    }

    #[test]
    fn test_retry_after_seconds_is_capped() {
        let mut headers = http::HeaderMap::new();
        headers.insert(RETRY_AFTER, http::HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));

        headers.insert(RETRY_AFTER, http::HeaderValue::from_static("3600"));
        assert_eq!(
            parse_retry_after(&headers),
            Some(Duration::from_secs(RETRY_AFTER_MAX_SECS))
        );
    }

    #[test]
    fn test_retry_after_http_date_and_garbage() {
        let target = SystemTime::now() + Duration::from_secs(2);
        let mut headers = http::HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            http::HeaderValue::from_str(&httpdate::fmt_http_date(target)).unwrap(),
        );
        assert!(parse_retry_after(&headers).unwrap() <= Duration::from_secs(2));

        headers.insert(RETRY_AFTER, http::HeaderValue::from_static("soon"));
        assert!(parse_retry_after(&headers).is_none());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(8), Duration::from_secs(1));
    }

    #[test]
    fn test_transport_classification() {
        assert!(RetryPolicy::should_retry_transport("Connection refused (os error 111)"));
        assert!(!RetryPolicy::should_retry_transport("invalid certificate"));

        let policy = RetryPolicy::default();
        assert_eq!(
            policy.transport_delay("connection reset by peer", 0),
            Duration::ZERO
        );
        assert_eq!(
            policy.transport_delay("unexpected EOF", 1),
            FAST_SECOND_RETRY
        );
        assert_eq!(
            policy.transport_delay("operation timed out", 0),
            policy.backoff(0)
        );
    }

    #[test]
    fn test_disabled_policy_never_allows() {
        assert!(!RetryPolicy::disabled().allows(0));
        assert!(RetryPolicy::default().allows(1));
        assert!(!RetryPolicy::default().allows(2));
    }
}
