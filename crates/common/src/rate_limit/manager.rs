//! Sliding-window rate limiter keyed by normalized path

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::normalize::normalize_path;
use super::types::{RateLimitConfig, RateLimitExceeded, RateLimitStatus};
use super::window::SlidingWindow;
use super::RateLimiter;
use crate::error::CommonResult;
use crate::resilience::{Clock, SystemClock};
use crate::time::PeriodicSweep;

/// Admission control with one sliding window per normalized path
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use hubwire_common::rate_limit::{RateLimitConfig, RateLimitManager, RateLimiter};
///
/// let limiter = RateLimitManager::new(RateLimitConfig::new(2, Duration::from_secs(1)));
/// assert!(limiter.check_limit("/services/1").is_ok());
/// assert!(limiter.check_limit("/services/2").is_ok());
/// assert!(limiter.check_limit("/services/3").is_err());
/// ```
pub struct RateLimitManager<C: Clock = SystemClock> {
    window: Arc<Mutex<SlidingWindow>>,
    config: RateLimitConfig,
    clock: C,
    sweep: Mutex<Option<PeriodicSweep>>,
}

impl<C: Clock> std::fmt::Debug for RateLimitManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitManager")
            .field("config", &self.config)
            .field("buckets", &self.window.lock().bucket_count())
            .finish()
    }
}

impl RateLimitManager<SystemClock> {
    /// Create a limiter on the system clock
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> RateLimitManager<C> {
    /// Create a limiter with a custom clock (useful for testing)
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Self {
        Self {
            window: Arc::new(Mutex::new(SlidingWindow::new(config.max_requests, config.window_ms))),
            config,
            clock,
            sweep: Mutex::new(None),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of tracked buckets
    pub fn bucket_count(&self) -> usize {
        self.window.lock().bucket_count()
    }

    /// Drop buckets whose records have all left the window
    pub fn cleanup_idle(&self) -> usize {
        let now = self.clock.millis_since_epoch();
        self.window.lock().purge_idle(now)
    }

    /// Start the periodic idle-bucket sweep on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns an error when no tokio runtime is available or the configured
    /// interval is zero.
    pub fn start_cleanup(&self) -> CommonResult<()> {
        let mut slot = self.sweep.lock();
        if slot.as_ref().is_some_and(PeriodicSweep::is_running) {
            return Ok(());
        }
        let window = Arc::clone(&self.window);
        let clock = self.clock.clone();
        let sweep =
            PeriodicSweep::spawn("rate-limit-cleanup", self.config.cleanup_interval, move || {
                let removed = window.lock().purge_idle(clock.millis_since_epoch());
                if removed > 0 {
                    debug!(removed, "Rate-limit sweep dropped idle buckets");
                }
            })?;
        *slot = Some(sweep);
        Ok(())
    }
}

impl<C: Clock + Clone> RateLimiter for RateLimitManager<C> {
    fn check_limit(&self, path: &str) -> Result<RateLimitStatus, RateLimitExceeded> {
        let key = normalize_path(path);
        let now = self.clock.millis_since_epoch();
        let mut window = self.window.lock();

        if let Err(rejection) = window.evaluate(&key, now) {
            warn!(
                path = %key,
                limit = rejection.limit,
                retry_after = rejection.retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(RateLimitExceeded::new(
                key,
                rejection.limit,
                rejection.retry_after_secs,
                rejection.reset_ms,
                false,
            ));
        }
        window.record(&key, now);
        Ok(window.status(&key, now))
    }

    fn status(&self, path: Option<&str>) -> RateLimitStatus {
        let now = self.clock.millis_since_epoch();
        let window = self.window.lock();
        match path {
            Some(path) => window.status(&normalize_path(path), now),
            None => window.most_constrained(now),
        }
    }

    fn reset(&self, path: &str) {
        self.window.lock().remove(&normalize_path(path));
    }

    fn reset_all(&self) {
        self.window.lock().clear();
    }

    fn destroy(&self) {
        if let Some(sweep) = self.sweep.lock().take() {
            sweep.stop();
        }
        self.window.lock().clear();
    }
}
