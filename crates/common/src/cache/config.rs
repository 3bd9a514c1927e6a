//! Cache configuration types and builder patterns
//!
//! This module provides configuration types for customizing cache behavior,
//! including eviction policies, default TTL, size limits and the background
//! cleanup interval.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time-to-live applied when `set` is called without one
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of entries
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default interval of the background expiry sweep
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Eviction policy for cache entries when capacity is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evicts the entry with the fewest hits, oldest first on ties
    #[default]
    Lru,
    /// Evicts the oldest entry by insertion time, ignoring hits
    Fifo,
}

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// When false, `get` always misses and `set` is a no-op
    pub enabled: bool,

    /// TTL used by `set` when the caller does not pass one
    pub default_ttl: Duration,

    /// Maximum number of entries
    pub max_size: usize,

    /// Eviction policy when max_size is reached
    pub eviction_policy: EvictionPolicy,

    /// Interval of the background expiry sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
            eviction_policy: EvictionPolicy::Lru,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for a bounded LRU cache with the default TTL
    ///
    /// # Example
    /// ```
    /// use hubwire_common::cache::CacheConfig;
    ///
    /// let config = CacheConfig::lru(1000);
    /// assert_eq!(config.max_size, 1000);
    /// ```
    pub fn lru(max_size: usize) -> Self {
        Self { max_size, eviction_policy: EvictionPolicy::Lru, ..Self::default() }
    }

    /// Quick preset for a bounded FIFO cache with the default TTL
    pub fn fifo(max_size: usize) -> Self {
        Self { max_size, eviction_policy: EvictionPolicy::Fifo, ..Self::default() }
    }

    /// Configuration with caching switched off
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the cache
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set maximum number of entries
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Set default time-to-live for entries
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.config.default_ttl = duration;
        self
    }

    /// Set default time-to-live in whole seconds
    pub fn ttl_secs(self, seconds: u64) -> Self {
        self.ttl(Duration::from_secs(seconds))
    }

    /// Set eviction policy
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Set the background sweep interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
