//! Two-level cache composed of a fast L1 and an optional larger L2
//!
//! Reads fall through L1 to L2 and promote L2 hits into L1 with the entry's
//! remaining TTL. Writes and deletes apply to both levels.

use std::hash::Hash;
use std::time::Duration;

use serde::Serialize;

use super::config::CacheConfig;
use super::core::CacheManager;
use super::stats::CacheStats;
use crate::error::CommonResult;
use crate::resilience::{Clock, SystemClock};

/// Per-level statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiLevelStats {
    /// L1 statistics
    pub l1: CacheStats,
    /// L2 statistics, absent when no L2 is configured
    pub l2: Option<CacheStats>,
}

/// L1 cache backed by an optional L2 cache
pub struct MultiLevelCacheManager<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
    C: Clock,
{
    l1: CacheManager<K, V, C>,
    l2: Option<CacheManager<K, V, C>>,
    clock: C,
}

impl<K, V, C> Clone for MultiLevelCacheManager<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self { l1: self.l1.clone(), l2: self.l2.clone(), clock: self.clock.clone() }
    }
}

impl<K, V> MultiLevelCacheManager<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
{
    /// Create a two-level cache on the system clock
    pub fn new(l1: CacheConfig, l2: Option<CacheConfig>) -> Self {
        Self::with_clock(l1, l2, SystemClock)
    }
}

impl<K, V, C> MultiLevelCacheManager<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
    C: Clock + Clone,
{
    /// Create a two-level cache sharing one clock
    pub fn with_clock(l1: CacheConfig, l2: Option<CacheConfig>, clock: C) -> Self {
        Self {
            l1: CacheManager::with_clock(l1, clock.clone()),
            l2: l2.map(|config| CacheManager::with_clock(config, clock.clone())),
            clock,
        }
    }

    /// The L1 cache
    pub fn l1(&self) -> &CacheManager<K, V, C> {
        &self.l1
    }

    /// The L2 cache, if configured
    pub fn l2(&self) -> Option<&CacheManager<K, V, C>> {
        self.l2.as_ref()
    }

    /// Look up L1, then L2; an L2 hit is copied into L1 before returning
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(value) = self.l1.get(key) {
            return Some(value);
        }
        let l2 = self.l2.as_ref()?;
        let entry = l2.get_entry(key)?;
        let remaining = entry.remaining_ttl(self.clock.millis_since_epoch());
        self.l1.set(key.clone(), entry.data.clone(), Some(remaining));
        Some(entry.data)
    }

    /// Store in both levels
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        if let Some(l2) = &self.l2 {
            l2.set(key.clone(), value.clone(), ttl);
        }
        self.l1.set(key, value, ttl);
    }

    /// Remove from both levels; true if either held the key
    pub fn delete(&self, key: &K) -> bool {
        let in_l1 = self.l1.delete(key);
        let in_l2 = self.l2.as_ref().is_some_and(|l2| l2.delete(key));
        in_l1 || in_l2
    }

    /// Expiry-aware membership check across both levels
    pub fn has(&self, key: &K) -> bool {
        self.l1.has(key) || self.l2.as_ref().is_some_and(|l2| l2.has(key))
    }

    /// Clear both levels and their statistics
    pub fn clear(&self) {
        self.l1.clear();
        if let Some(l2) = &self.l2 {
            l2.clear();
        }
    }

    /// Purge expired entries from both levels
    pub fn cleanup_expired(&self) -> usize {
        self.l1.cleanup_expired() + self.l2.as_ref().map_or(0, CacheManager::cleanup_expired)
    }

    /// Remove every key matching `predicate` from both levels
    pub fn remove_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        self.l1.remove_where(&predicate)
            + self.l2.as_ref().map_or(0, |l2| l2.remove_where(&predicate))
    }

    /// Statistics for each level
    pub fn stats(&self) -> MultiLevelStats {
        MultiLevelStats { l1: self.l1.stats(), l2: self.l2.as_ref().map(CacheManager::stats) }
    }

    /// Stop sweeps and drop every entry in both levels
    pub fn destroy(&self) {
        self.l1.destroy();
        if let Some(l2) = &self.l2 {
            l2.destroy();
        }
    }
}

impl<K, V, C> MultiLevelCacheManager<K, V, C>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Serialize + Send + 'static,
    C: Clock + Clone,
{
    /// Start the background sweep of every level
    ///
    /// # Errors
    ///
    /// Returns an error when no tokio runtime is available.
    pub fn start_cleanup(&self) -> CommonResult<()> {
        self.l1.start_cleanup()?;
        if let Some(l2) = &self.l2 {
            l2.start_cleanup()?;
        }
        Ok(())
    }
}
