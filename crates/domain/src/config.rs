//! Client configuration
//!
//! `ClientConfig` is the single explicit configuration surface of the
//! client. Field names serialize in camelCase (`baseURL`, `retryDelay`, ...)
//! so JSON and TOML config files written for other SDKs load unchanged.
//! Every optional field has a documented default.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::types::request::RequestOptions;

/// Default per-attempt timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default number of retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 3;
/// Default base backoff delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// Default upper bound of backoff jitter in milliseconds
pub const DEFAULT_RETRY_JITTER_MS: u64 = 1_000;

/// Cache eviction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Evict the entry with the fewest hits
    #[default]
    Lru,
    /// Evict the oldest entry
    Fifo,
}

impl std::str::FromStr for CacheStrategy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "fifo" => Ok(Self::Fifo),
            other => Err(ApiError::configuration(format!("unknown cache strategy '{other}'"))),
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Whether GET responses are cached (default true)
    pub enabled: bool,
    /// Default TTL in seconds (default 300)
    pub ttl: u64,
    /// Maximum entries (default 1000)
    pub max_size: usize,
    /// Eviction strategy (default lru)
    pub strategy: CacheStrategy,
    /// Expiry sweep interval in milliseconds (default 60000)
    pub cleanup_interval_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: 300,
            max_size: 1_000,
            strategy: CacheStrategy::Lru,
            cleanup_interval_ms: 60_000,
        }
    }
}

/// Sliding-window rate limit settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitSettings {
    /// Requests per window (default 100)
    pub max_requests: u32,
    /// Window length in milliseconds (default 60000)
    pub window_ms: u64,
    /// Idle-bucket sweep interval in milliseconds (default 300000)
    pub cleanup_interval_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { max_requests: 100, window_ms: 60_000, cleanup_interval_ms: 300_000 }
    }
}

/// Burst window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstSettings {
    /// Requests per burst window
    pub max_burst: u32,
    /// Burst window length in milliseconds
    pub burst_window_ms: u64,
}

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// API root every request path is joined onto
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Per-attempt timeout in milliseconds
    #[serde(rename = "timeout", default = "default_timeout")]
    pub timeout_ms: u64,
    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base backoff delay in milliseconds
    #[serde(rename = "retryDelay", default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Upper bound of backoff jitter in milliseconds
    #[serde(rename = "retryJitter", default = "default_retry_jitter")]
    pub retry_jitter_ms: u64,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Regular rate limit
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Optional burst window on top of the regular limit
    #[serde(default)]
    pub burst_rate_limit: Option<BurstSettings>,
    /// L1 response cache
    #[serde(default)]
    pub cache: CacheSettings,
    /// Optional L2 response cache
    #[serde(default)]
    pub l2_cache: Option<CacheSettings>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_retry_jitter() -> u64 {
    DEFAULT_RETRY_JITTER_MS
}

impl ClientConfig {
    /// Configuration with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            retry_jitter_ms: DEFAULT_RETRY_JITTER_MS,
            headers: BTreeMap::new(),
            rate_limit: RateLimitSettings::default(),
            burst_rate_limit: None,
            cache: CacheSettings::default(),
            l2_cache: None,
        }
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base backoff delay
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Jitter bound
    pub fn retry_jitter(&self) -> Duration {
        Duration::from_millis(self.retry_jitter_ms)
    }

    /// Client-wide request defaults, the base that per-call options merge
    /// over
    pub fn default_options(&self) -> RequestOptions {
        RequestOptions {
            timeout: Some(self.timeout()),
            retries: Some(self.retries),
            retry_delay: Some(self.retry_delay()),
            headers: self.headers.clone(),
            ..RequestOptions::default()
        }
    }

    /// Check the configuration for values the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns `CONFIGURATION_ERROR` naming the first offending field.
    pub fn validate(&self) -> Result<(), ApiError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ApiError::configuration(format!("baseURL is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::configuration("baseURL must use http or https"));
        }
        if self.timeout_ms == 0 {
            return Err(ApiError::configuration("timeout must be greater than 0"));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_ms == 0 {
            return Err(ApiError::configuration(
                "rateLimit.maxRequests and rateLimit.windowMs must be greater than 0",
            ));
        }
        if let Some(burst) = &self.burst_rate_limit {
            if burst.max_burst == 0 || burst.burst_window_ms == 0 {
                return Err(ApiError::configuration(
                    "burstRateLimit.maxBurst and burstRateLimit.burstWindowMs must be greater than 0",
                ));
            }
        }
        for (name, cache) in std::iter::once(("cache", &self.cache))
            .chain(self.l2_cache.as_ref().map(|c| ("l2Cache", c)))
        {
            if cache.enabled && (cache.max_size == 0 || cache.cleanup_interval_ms == 0) {
                return Err(ApiError::configuration(format!(
                    "{name}.maxSize and {name}.cleanupIntervalMs must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}
