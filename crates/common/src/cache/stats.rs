//! Cache statistics and metrics tracking
//!
//! This module provides types for tracking cache performance metrics
//! including hit rates, eviction counts and memory footprint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,

    /// Maximum allowed entries
    pub max_size: usize,

    /// Total number of successful get operations
    pub hits: u64,

    /// Total number of failed get operations (key not found or expired)
    pub misses: u64,

    /// Total number of insert operations
    pub inserts: u64,

    /// Total number of evicted entries
    pub evictions: u64,

    /// Total number of expired entries removed
    pub expirations: u64,

    /// Sum of the JSON-serialized length of every stored value
    pub approx_bytes: usize,

    /// Creation time (ms since epoch) of the oldest live entry
    pub oldest_entry_ms: Option<u64>,

    /// Creation time (ms since epoch) of the newest live entry
    pub newest_entry_ms: Option<u64>,
}

impl CacheStats {
    /// Calculate hit rate (hits / total accesses)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate fill percentage (size / max_size)
    pub fn fill_percentage(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.size as f64 / self.max_size as f64
        }
    }

    /// Total number of access operations (hits + misses)
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Thread-safe metrics collector for cache operations
///
/// Counters are atomics so reads on the hot path never take the storage
/// lock just to bump a number. Clones share counters.
#[derive(Debug, Clone, Default)]
pub(crate) struct MetricsCollector {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    inserts: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
    expirations: Arc<AtomicU64>,
}

impl MetricsCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Counters only; size and entry-derived fields are filled by the cache
    pub(crate) fn snapshot(&self, max_size: usize) -> CacheStats {
        CacheStats {
            max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }

    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::stats.
    use super::*;

    /// Validates `CacheStats::hit_rate` behavior for the hit rate calculation
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `(stats.hit_rate() - 0.8).abs() < 1e-10` evaluates to true.
    /// - Confirms `stats.total_accesses()` equals `100`.
    #[test]
    fn test_hit_rate_calculation() {
        let stats = CacheStats { hits: 80, misses: 20, ..Default::default() };

        assert!((stats.hit_rate() - 0.8).abs() < 1e-10);
        assert_eq!(stats.total_accesses(), 100);
    }

    /// Validates `CacheStats::default` behavior for the no accesses scenario.
    ///
    /// Assertions:
    /// - Confirms `stats.hit_rate()` equals `0.0`.
    /// - Confirms `stats.fill_percentage()` equals `0.0`.
    #[test]
    fn test_hit_rate_no_accesses() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.fill_percentage(), 0.0);
    }

    /// Validates `MetricsCollector` behavior for the record and reset
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms counters reflect recorded events.
    /// - Confirms clones share counters.
    /// - Confirms `reset` zeroes every counter.
    #[test]
    fn test_metrics_collector_record_and_reset() {
        let metrics = MetricsCollector::new();
        let shared = metrics.clone();
        metrics.record_hit();
        shared.record_miss();
        metrics.record_insert();
        metrics.record_eviction();
        metrics.record_expirations(3);

        let snapshot = metrics.snapshot(10);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.inserts, 1);
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.expirations, 3);
        assert_eq!(snapshot.max_size, 10);

        shared.reset();
        assert_eq!(metrics.snapshot(10), CacheStats { max_size: 10, ..Default::default() });
    }

    /// Validates `CacheStats` serialization for the camelCase shape scenario.
    ///
    /// Assertions:
    /// - Ensures the JSON uses `maxSize` and `approxBytes` keys.
    #[test]
    fn test_cache_stats_serializes_camel_case() {
        let json = serde_json::to_value(CacheStats::default()).unwrap();
        assert!(json.get("maxSize").is_some());
        assert!(json.get("approxBytes").is_some());
    }
}
