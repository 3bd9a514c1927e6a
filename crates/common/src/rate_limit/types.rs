//! Rate-limit configuration, status and rejection types

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Error code carried by every local rate-limit rejection
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

/// Default interval of the idle-bucket sweep
pub const DEFAULT_RATE_LIMIT_CLEANUP: Duration = Duration::from_secs(5 * 60);

/// Sliding-window limit applied per normalized path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub max_requests: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Interval of the background sweep that drops idle buckets
    #[serde(skip, default = "default_cleanup")]
    pub cleanup_interval: Duration,
}

fn default_cleanup() -> Duration {
    DEFAULT_RATE_LIMIT_CLEANUP
}

impl RateLimitConfig {
    /// Limit of `max_requests` per `window`
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            cleanup_interval: DEFAULT_RATE_LIMIT_CLEANUP,
        }
    }

    /// Override the idle-bucket sweep interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Window length
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

/// Short burst window layered over the regular limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstConfig {
    /// Requests admitted per burst window
    pub max_burst: u32,
    /// Burst window length in milliseconds
    pub burst_window_ms: u64,
}

impl BurstConfig {
    /// Burst limit of `max_burst` per `window`
    pub fn new(max_burst: u32, window: Duration) -> Self {
        Self { max_burst, burst_window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX) }
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

/// Quota snapshot for one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Requests admitted per window
    pub limit: u32,
    /// Requests still admissible in the current window
    pub remaining: u32,
    /// When the oldest in-window request leaves the window
    pub reset: DateTime<Utc>,
    /// Whole seconds until a request would be admitted, when exhausted
    pub retry_after: Option<u64>,
}

/// Local admission-control rejection
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("Rate limit exceeded for '{path}': retry after {retry_after}s")]
pub struct RateLimitExceeded {
    /// Always `RATE_LIMIT_EXCEEDED`
    pub code: &'static str,
    /// Always 429
    pub status_code: u16,
    /// Whole seconds until the oldest in-window request expires
    pub retry_after: u64,
    /// Limit of the window that rejected the request
    pub limit: u32,
    /// Always 0
    pub remaining: u32,
    /// When the rejecting window frees a slot
    pub reset: DateTime<Utc>,
    /// True when the burst window rejected the request
    pub burst: bool,
    /// Normalized bucket key
    pub path: String,
}

impl RateLimitExceeded {
    pub(crate) fn new(path: String, limit: u32, retry_after: u64, reset_ms: u64, burst: bool) -> Self {
        Self {
            code: RATE_LIMIT_EXCEEDED,
            status_code: 429,
            retry_after,
            limit,
            remaining: 0,
            reset: millis_to_datetime(reset_ms),
            burst,
            path,
        }
    }

    /// Suggested wait as a `Duration`
    pub fn retry_after_duration(&self) -> Duration {
        Duration::from_secs(self.retry_after)
    }
}

impl ErrorClassification for RateLimitExceeded {
    fn is_retryable(&self) -> bool {
        true
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        Some(self.retry_after_duration())
    }
}

pub(crate) fn millis_to_datetime(ms: u64) -> DateTime<Utc> {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX);
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `RateLimitExceeded` serialization for the payload shape
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the camelCase keys and fixed values.
    /// - Confirms `reset` is an RFC 3339 timestamp.
    #[test]
    fn test_rate_limit_exceeded_payload() {
        let err = RateLimitExceeded::new("/services".into(), 3, 1, 1_000, false);
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(json["statusCode"], 429);
        assert_eq!(json["retryAfter"], 1);
        assert_eq!(json["remaining"], 0);
        assert_eq!(json["burst"], false);
        assert_eq!(json["reset"], "1970-01-01T00:00:01Z");
        assert!(err.to_string().contains("/services"));
        assert_eq!(err.retry_after_duration(), Duration::from_secs(1));
    }

    /// Validates `RateLimitConfig` serde behavior for the camelCase config
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `maxRequests`/`windowMs` parse and the sweep keeps its
    ///   default.
    #[test]
    fn test_rate_limit_config_deserialize() {
        let config: RateLimitConfig =
            serde_json::from_str(r#"{"maxRequests": 3, "windowMs": 1000}"#).unwrap();
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.window(), Duration::from_secs(1));
        assert_eq!(config.cleanup_interval, DEFAULT_RATE_LIMIT_CLEANUP);
    }
}
