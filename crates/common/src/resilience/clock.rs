//! Time source abstraction for TTLs, rate windows and backoff
//!
//! Everything time-dependent in the pipeline reads the clock through the
//! [`Clock`] trait so tests can drive time with [`MockClock`] instead of
//! sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Clock abstraction for time-dependent components
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Shared, type-erased clock handed to components built at runtime
pub type SharedClock = Arc<dyn Clock>;

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }

    fn millis_since_epoch(&self) -> u64 {
        (**self).millis_since_epoch()
    }
}

/// Mock clock for deterministic testing
///
/// Wall-clock time starts at the UNIX epoch and only moves when the test
/// calls [`MockClock::advance`] or [`MockClock::set_elapsed`]. Clones share
/// the same elapsed counter.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Create a mock clock whose wall-clock time starts `millis` after the
    /// epoch
    pub fn starting_at_millis(millis: u64) -> Self {
        let clock = Self::new();
        clock.set_elapsed(Duration::from_millis(millis));
        clock
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates the system clock system time scenario.
    ///
    /// Assertions:
    /// - Ensures `clock.millis_since_epoch() > 0` evaluates to true.
    #[test]
    fn test_system_clock_millis_since_epoch() {
        let clock = SystemClock;
        assert!(clock.millis_since_epoch() > 0, "System time should be after Unix epoch");
    }

    /// Validates `MockClock::advance_millis` behavior for the mock clock
    /// advance scenario.
    ///
    /// Assertions:
    /// - Confirms `clock.millis_since_epoch()` equals `1500`.
    /// - Confirms `after.duration_since(start)` equals 1500 ms.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();

        clock.advance_millis(1000);
        clock.advance(Duration::from_millis(500));

        assert_eq!(clock.millis_since_epoch(), 1500);
        assert_eq!(clock.now().duration_since(start), Duration::from_millis(1500));
    }

    /// Validates `MockClock::clone` behavior for the shared elapsed scenario.
    ///
    /// Assertions:
    /// - Confirms both clones observe the same elapsed time.
    #[test]
    fn test_mock_clock_clone_shares_time() {
        let clock1 = MockClock::starting_at_millis(10_000);
        let clock2 = clock1.clone();

        clock2.advance_millis(5_000);
        assert_eq!(clock1.elapsed(), Duration::from_secs(15));
        assert_eq!(clock2.millis_since_epoch(), 15_000);
    }

    /// Validates `SharedClock` behavior for the type-erased clock scenario.
    ///
    /// Assertions:
    /// - Confirms the shared handle follows the underlying mock.
    #[test]
    fn test_shared_clock_delegates() {
        let mock = MockClock::new();
        let shared: SharedClock = Arc::new(mock.clone());

        mock.advance_millis(42);
        assert_eq!(shared.millis_since_epoch(), 42);
    }
}
