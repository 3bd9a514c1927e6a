//! Rate limiter with an additional short burst window

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::normalize::normalize_path;
use super::types::{BurstConfig, RateLimitConfig, RateLimitExceeded, RateLimitStatus};
use super::window::{Rejection, SlidingWindow};
use super::RateLimiter;
use crate::error::CommonResult;
use crate::resilience::{Clock, SystemClock};
use crate::time::PeriodicSweep;

#[derive(Debug)]
struct Windows {
    regular: SlidingWindow,
    burst: SlidingWindow,
}

impl Windows {
    fn tighter(a: RateLimitStatus, b: RateLimitStatus) -> RateLimitStatus {
        if b.remaining < a.remaining {
            b
        } else {
            a
        }
    }
}

/// Regular sliding window plus a burst window; a request must pass both
///
/// Both windows are evaluated before either records, so a rejection by one
/// never consumes quota in the other.
pub struct AdvancedRateLimitManager<C: Clock = SystemClock> {
    windows: Arc<Mutex<Windows>>,
    config: RateLimitConfig,
    burst: BurstConfig,
    clock: C,
    sweep: Mutex<Option<PeriodicSweep>>,
}

impl<C: Clock> std::fmt::Debug for AdvancedRateLimitManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvancedRateLimitManager")
            .field("config", &self.config)
            .field("burst", &self.burst)
            .finish()
    }
}

impl AdvancedRateLimitManager<SystemClock> {
    /// Create a burst-aware limiter on the system clock
    pub fn new(config: RateLimitConfig, burst: BurstConfig) -> Self {
        Self::with_clock(config, burst, SystemClock)
    }
}

impl<C: Clock + Clone> AdvancedRateLimitManager<C> {
    /// Create a burst-aware limiter with a custom clock
    pub fn with_clock(config: RateLimitConfig, burst: BurstConfig, clock: C) -> Self {
        let windows = Windows {
            regular: SlidingWindow::new(config.max_requests, config.window_ms),
            burst: SlidingWindow::new(burst.max_burst, burst.burst_window_ms),
        };
        Self {
            windows: Arc::new(Mutex::new(windows)),
            config,
            burst,
            clock,
            sweep: Mutex::new(None),
        }
    }

    /// Burst configuration
    pub fn burst_config(&self) -> &BurstConfig {
        &self.burst
    }

    /// Number of tracked buckets in the regular window
    pub fn bucket_count(&self) -> usize {
        self.windows.lock().regular.bucket_count()
    }

    /// Drop idle buckets from both windows
    pub fn cleanup_idle(&self) -> usize {
        let now = self.clock.millis_since_epoch();
        let mut windows = self.windows.lock();
        windows.regular.purge_idle(now) + windows.burst.purge_idle(now)
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
        let windows = Arc::clone(&self.windows);
        let clock = self.clock.clone();
        let sweep =
            PeriodicSweep::spawn("burst-rate-limit-cleanup", self.config.cleanup_interval, move || {
                let now = clock.millis_since_epoch();
                let mut windows = windows.lock();
                let removed = windows.regular.purge_idle(now) + windows.burst.purge_idle(now);
                if removed > 0 {
                    debug!(removed, "Rate-limit sweep dropped idle buckets");
                }
            })?;
        *slot = Some(sweep);
        Ok(())
    }

    fn reject(key: String, rejection: Rejection, burst: bool) -> RateLimitExceeded {
        warn!(
            path = %key,
            limit = rejection.limit,
            retry_after = rejection.retry_after_secs,
            burst,
            "Rate limit exceeded"
        );
        RateLimitExceeded::new(
            key,
            rejection.limit,
            rejection.retry_after_secs,
            rejection.reset_ms,
            burst,
        )
    }
}

impl<C: Clock + Clone> RateLimiter for AdvancedRateLimitManager<C> {
    fn check_limit(&self, path: &str) -> Result<RateLimitStatus, RateLimitExceeded> {
        let key = normalize_path(path);
        let now = self.clock.millis_since_epoch();
        let mut windows = self.windows.lock();

        if let Err(rejection) = windows.regular.evaluate(&key, now) {
            return Err(Self::reject(key, rejection, false));
        }
        if let Err(rejection) = windows.burst.evaluate(&key, now) {
            return Err(Self::reject(key, rejection, true));
        }

        windows.regular.record(&key, now);
        windows.burst.record(&key, now);
        Ok(Windows::tighter(windows.regular.status(&key, now), windows.burst.status(&key, now)))
    }

    fn status(&self, path: Option<&str>) -> RateLimitStatus {
        let now = self.clock.millis_since_epoch();
        let windows = self.windows.lock();
        match path {
            Some(path) => {
                let key = normalize_path(path);
                Windows::tighter(windows.regular.status(&key, now), windows.burst.status(&key, now))
            }
            None => Windows::tighter(
                windows.regular.most_constrained(now),
                windows.burst.most_constrained(now),
            ),
        }
    }

    fn reset(&self, path: &str) {
        let key = normalize_path(path);
        let mut windows = self.windows.lock();
        windows.regular.remove(&key);
        windows.burst.remove(&key);
    }

    fn reset_all(&self) {
        let mut windows = self.windows.lock();
        windows.regular.clear();
        windows.burst.clear();
    }

    fn destroy(&self) {
        if let Some(sweep) = self.sweep.lock().take() {
            sweep.stop();
        }
        self.reset_all();
    }
}
