//! Client-side admission control
//!
//! Requests are counted per normalized path in a sliding window. The
//! [`RateLimiter`] trait is what the request pipeline consumes; two
//! implementations are provided:
//!
//! - [`RateLimitManager`]: one sliding window per path
//! - [`AdvancedRateLimitManager`]: a regular window plus a short burst window
//!
//! `check_limit` is synchronous and is the only operation that can fail.

pub mod advanced;
pub mod manager;
pub mod normalize;
pub mod types;
mod window;

pub use advanced::AdvancedRateLimitManager;
pub use manager::RateLimitManager;
pub use normalize::normalize_path;
pub use types::{
    BurstConfig, RateLimitConfig, RateLimitExceeded, RateLimitStatus, DEFAULT_RATE_LIMIT_CLEANUP,
    RATE_LIMIT_EXCEEDED,
};

/// Admission control consumed by the request pipeline
pub trait RateLimiter: Send + Sync {
    /// Admit and record a request for `path`, or reject it
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when the window for the normalized path
    /// is full. Rejected requests are not recorded.
    fn check_limit(&self, path: &str) -> Result<RateLimitStatus, RateLimitExceeded>;

    /// Quota for `path`, or for the most constrained bucket when `None`
    fn status(&self, path: Option<&str>) -> RateLimitStatus;

    /// Forget all records for the bucket `path` normalizes to
    fn reset(&self, path: &str);

    /// Forget all records
    fn reset_all(&self);

    /// Stop background work and drop all state
    fn destroy(&self);
}
