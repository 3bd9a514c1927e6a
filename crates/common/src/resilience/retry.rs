//! Retry decisions and exponential backoff with jitter
//!
//! The executor asks a [`RetryPolicy`] whether a failed attempt should be
//! retried and asks a [`BackoffSchedule`] how long to wait. The schedule
//! never hands out a delay shorter than the one before it, and never one
//! shorter than a server-provided `Retry-After`. When a ceiling is set the
//! server hint is clamped to it.

use std::time::Duration;

use rand::Rng;

/// Trait for determining whether an error should trigger a retry
pub trait RetryPolicy<E> {
    /// Decide whether to retry after `error` occurred on zero-based `attempt`
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation, waiting at least this long
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Default upper bound for the uniform jitter added to each delay
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);

/// Exponential backoff: `base_delay * 2^attempt + uniform(0..=max_jitter)`
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay before the first retry, before jitter
    pub base_delay: Duration,
    /// Upper bound of the random jitter added to every delay
    pub max_jitter: Duration,
    /// Optional ceiling on the exponential part
    pub max_delay: Option<Duration>,
}

impl ExponentialBackoff {
    /// Create a backoff with the default jitter and no ceiling
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay, max_jitter: DEFAULT_MAX_JITTER, max_delay: None }
    }

    /// Override the jitter bound
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Cap the exponential part of the delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Exponential part of the delay for `attempt`, without jitter
    pub fn base_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis().min(u128::from(u64::MAX)) as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(factor));
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Full delay for `attempt`, including a fresh jitter sample
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_for(attempt) + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis().min(u128::from(u64::MAX)) as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

/// Per-call backoff state
///
/// One schedule lives for the duration of a single logical request so that
/// successive delays are non-decreasing even though jitter is random.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    backoff: ExponentialBackoff,
    last_delay: Duration,
}

impl BackoffSchedule {
    /// Start a fresh schedule
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self { backoff, last_delay: Duration::ZERO }
    }

    /// Delay to wait before retrying after the failure of `attempt`
    ///
    /// The result is at least the previous delay and at least `retry_after`
    /// when the server supplied one. `retry_after` never raises the delay
    /// above `max_delay` plus jitter.
    pub fn next_delay(&mut self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let mut delay = self.backoff.delay_for(attempt).max(self.last_delay);
        if let Some(server_delay) = retry_after {
            let server_delay = match self.backoff.max_delay {
                Some(max) => server_delay.min(max + self.backoff.max_jitter),
                None => server_delay,
            };
            delay = delay.max(server_delay);
        }
        self.last_delay = delay;
        delay
    }

    /// The most recent delay handed out, zero before the first retry
    pub fn last_delay(&self) -> Duration {
        self.last_delay
    }
}
