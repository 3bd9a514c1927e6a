//! Sliding-window request log keyed by bucket

use std::collections::{HashMap, VecDeque};

use super::types::{millis_to_datetime, RateLimitStatus};

/// Why a window refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rejection {
    pub(crate) limit: u32,
    pub(crate) retry_after_secs: u64,
    pub(crate) reset_ms: u64,
}

/// Per-bucket accept timestamps (ms), oldest first
///
/// A record at `ts` counts while `now <= ts + window_ms`: only records older
/// than `now - window_ms` are dropped. A rejection at the boundary still
/// reports a one second wait.
#[derive(Debug)]
pub(crate) struct SlidingWindow {
    limit: u32,
    window_ms: u64,
    buckets: HashMap<String, VecDeque<u64>>,
}

impl SlidingWindow {
    pub(crate) fn new(limit: u32, window_ms: u64) -> Self {
        Self { limit, window_ms, buckets: HashMap::new() }
    }

    pub(crate) fn limit(&self) -> u32 {
        self.limit
    }

    fn in_window(&self, ts: u64, now: u64) -> bool {
        ts.saturating_add(self.window_ms) >= now
    }

    fn reset_at(&self, oldest: u64) -> u64 {
        oldest.saturating_add(self.window_ms)
    }

    fn prune(&mut self, key: &str, now: u64) {
        let window_ms = self.window_ms;
        if let Some(records) = self.buckets.get_mut(key) {
            while records.front().is_some_and(|&ts| ts.saturating_add(window_ms) < now) {
                records.pop_front();
            }
        }
    }

    /// Prune, then decide without recording
    pub(crate) fn evaluate(&mut self, key: &str, now: u64) -> Result<(), Rejection> {
        self.prune(key, now);
        let Some(records) = self.buckets.get(key) else {
            return if self.limit == 0 { Err(self.rejection_without_records(now)) } else { Ok(()) };
        };
        if records.len() < self.limit as usize {
            return Ok(());
        }
        match records.front() {
            Some(&oldest) => Err(self.rejection_for(oldest, now)),
            None => Err(self.rejection_without_records(now)),
        }
    }

    pub(crate) fn record(&mut self, key: &str, now: u64) {
        self.buckets.entry(key.to_string()).or_default().push_back(now);
    }

    fn rejection_for(&self, oldest: u64, now: u64) -> Rejection {
        let reset_ms = self.reset_at(oldest);
        Rejection { limit: self.limit, retry_after_secs: retry_after_secs(reset_ms, now), reset_ms }
    }

    fn rejection_without_records(&self, now: u64) -> Rejection {
        let reset_ms = now.saturating_add(self.window_ms);
        Rejection { limit: self.limit, retry_after_secs: retry_after_secs(reset_ms, now), reset_ms }
    }

    /// Quota for `key` at `now`, without mutating
    pub(crate) fn status(&self, key: &str, now: u64) -> RateLimitStatus {
        let live: Vec<u64> = self
            .buckets
            .get(key)
            .map(|records| records.iter().copied().filter(|&ts| self.in_window(ts, now)).collect())
            .unwrap_or_default();
        self.status_from(&live, now)
    }

    fn status_from(&self, live: &[u64], now: u64) -> RateLimitStatus {
        let used = u32::try_from(live.len()).unwrap_or(u32::MAX);
        let remaining = self.limit.saturating_sub(used);
        let reset_ms = live.first().map_or(now, |&oldest| self.reset_at(oldest));
        let retry_after = (remaining == 0).then(|| retry_after_secs(reset_ms, now));
        RateLimitStatus { limit: self.limit, remaining, reset: millis_to_datetime(reset_ms), retry_after }
    }

    /// Status of the bucket with the least remaining quota, or a full quota
    /// when nothing is tracked
    pub(crate) fn most_constrained(&self, now: u64) -> RateLimitStatus {
        self.buckets
            .keys()
            .map(|key| self.status(key, now))
            .min_by_key(|status| status.remaining)
            .unwrap_or_else(|| self.status_from(&[], now))
    }

    /// Drop buckets with no in-window records, returning how many went
    pub(crate) fn purge_idle(&mut self, now: u64) -> usize {
        let window_ms = self.window_ms;
        let before = self.buckets.len();
        self.buckets.retain(|_, records| {
            records.back().is_some_and(|&latest| latest.saturating_add(window_ms) >= now)
        });
        before - self.buckets.len()
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.buckets.remove(key);
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Whole seconds until `reset_ms`, never less than one
fn retry_after_secs(reset_ms: u64, now: u64) -> u64 {
    reset_ms.saturating_sub(now).div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `SlidingWindow::evaluate` behavior for the window boundary
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the limit is enforced inside the window.
    /// - Ensures a record still counts exactly `window_ms` later.
    /// - Ensures it frees its slot one millisecond after that.
    #[test]
    fn test_window_boundary() {
        let mut window = SlidingWindow::new(2, 1000);
        for now in [0, 10] {
            window.evaluate("/a", now).unwrap();
            window.record("/a", now);
        }
        let rejection = window.evaluate("/a", 999).unwrap_err();
        assert_eq!(rejection.retry_after_secs, 1);
        assert_eq!(rejection.reset_ms, 1000);

        let rejection = window.evaluate("/a", 1000).unwrap_err();
        assert_eq!(rejection.retry_after_secs, 1);
        assert_eq!(rejection.reset_ms, 1000);
        assert_eq!(window.status("/a", 1000).remaining, 0);
        assert_eq!(window.status("/a", 1000).retry_after, Some(1));

        assert!(window.evaluate("/a", 1001).is_ok());
        assert_eq!(window.status("/a", 1001).remaining, 1);
    }

    /// Validates `SlidingWindow::status` behavior for the read-only scenario.
    ///
    /// Assertions:
    /// - Confirms remaining quota and that status does not record.
    #[test]
    fn test_status_is_read_only() {
        let mut window = SlidingWindow::new(3, 1000);
        window.record("/a", 0);

        let status = window.status("/a", 100);
        assert_eq!(status.remaining, 2);
        assert_eq!(status.retry_after, None);
        assert_eq!(window.status("/a", 100).remaining, 2);
        assert_eq!(window.status("/other", 100).remaining, 3);
    }

    /// Validates `SlidingWindow::most_constrained` behavior for the global
    /// status scenario.
    ///
    /// Assertions:
    /// - Confirms the bucket with the least remaining quota is reported.
    #[test]
    fn test_most_constrained() {
        let mut window = SlidingWindow::new(2, 1000);
        assert_eq!(window.most_constrained(0).remaining, 2);

        window.record("/a", 0);
        window.record("/b", 0);
        window.record("/b", 1);
        let status = window.most_constrained(5);
        assert_eq!(status.remaining, 0);
        assert_eq!(status.retry_after, Some(1));
    }

    /// Validates `SlidingWindow::purge_idle` behavior for the idle bucket
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures only buckets with no in-window records are dropped.
    #[test]
    fn test_purge_idle() {
        let mut window = SlidingWindow::new(5, 1000);
        window.record("/old", 0);
        window.record("/fresh", 900);

        assert_eq!(window.purge_idle(1500), 1);
        assert_eq!(window.bucket_count(), 1);
        assert_eq!(window.status("/fresh", 1500).remaining, 4);
    }

    /// Validates `SlidingWindow::evaluate` behavior for a zero limit.
    ///
    /// Assertions:
    /// - Ensures every request is rejected.
    #[test]
    fn test_zero_limit_rejects() {
        let mut window = SlidingWindow::new(0, 1000);
        assert!(window.evaluate("/a", 0).is_err());
    }
}
