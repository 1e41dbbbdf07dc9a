//! Rate-limit headers and 429 bodies

use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;

pub const LIMIT: &str = "x-ratelimit-limit";
pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const BUCKET: &str = "x-ratelimit-bucket";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const SCOPE: &str = "x-ratelimit-scope";
pub const RETRY_AFTER: &str = "retry-after";

/// Which limit a 429 came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// Per-route limit of this token
    User,
    /// Token-wide limit
    Global,
    /// Per-resource limit shared with other users
    Shared,
}

impl RateLimitScope {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "global" => Some(Self::Global),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Rate-limit information carried by a response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
    pub global: bool,
    pub scope: Option<RateLimitScope>,
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    /// Read the rate-limit headers; absent or malformed values are `None`
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

        Self {
            limit: text(LIMIT).and_then(|v| v.parse().ok()),
            remaining: text(REMAINING).and_then(|v| v.parse().ok()),
            reset_after: text(RESET_AFTER).and_then(parse_seconds),
            bucket: text(BUCKET).map(str::to_string),
            global: text(GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scope: text(SCOPE).and_then(RateLimitScope::parse),
            retry_after: text(RETRY_AFTER).and_then(parse_seconds),
        }
    }

    /// Whether the response carried a usable bucket window
    pub fn has_window(&self) -> bool {
        self.remaining.is_some() && self.reset_after.is_some()
    }
}

/// JSON body of a 429 response
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBody {
    /// Seconds to wait
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl RateLimitBody {
    pub fn retry_after(&self) -> Duration {
        seconds(self.retry_after)
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().map(seconds)
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_parse_bucket_window() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "1"),
            ("x-ratelimit-reset-after", "1.5"),
            ("x-ratelimit-bucket", "abcd1234"),
        ]));

        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.remaining, Some(1));
        assert_eq!(parsed.reset_after, Some(Duration::from_millis(1500)));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert!(!parsed.global);
        assert!(parsed.has_window());
    }

    #[test]
    fn test_parse_global_429_headers() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("retry-after", "2"),
            ("x-ratelimit-global", "true"),
            ("x-ratelimit-scope", "global"),
        ]));

        assert!(parsed.global);
        assert_eq!(parsed.scope, Some(RateLimitScope::Global));
        assert_eq!(parsed.retry_after, Some(Duration::from_secs(2)));
        assert!(!parsed.has_window());
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("x-ratelimit-remaining", "lots"),
            ("x-ratelimit-reset-after", "-3"),
        ]));
        assert_eq!(parsed.remaining, None);
        assert_eq!(parsed.reset_after, Some(Duration::ZERO));
    }

    #[test]
    fn test_rate_limit_body() {
        let body: RateLimitBody = serde_json::from_str(
            r#"{"message": "You are being rate limited.", "retry_after": 0.25, "global": false}"#,
        )
        .unwrap();
        assert_eq!(body.retry_after(), Duration::from_millis(250));
        assert!(!body.global);
    }
}
