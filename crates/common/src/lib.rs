//! Modular building blocks for the Hubwire request pipeline.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types and classification
//! - `runtime`: cache, rate limiting, resilience (clock, backoff) and
//!   background sweeps
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod rate_limit;
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{CacheConfig, CacheManager, CacheStats, EvictionPolicy, MultiLevelCacheManager};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use rate_limit::{
    normalize_path, AdvancedRateLimitManager, BurstConfig, RateLimitConfig, RateLimitExceeded,
    RateLimitManager, RateLimitStatus, RateLimiter,
};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffSchedule, Clock, ExponentialBackoff, MockClock, RetryDecision, RetryPolicy,
    SharedClock, SystemClock,
};
#[cfg(feature = "runtime")]
pub use time::PeriodicSweep;
