//! Core cache implementation with TTL expiry and capacity-bounded eviction
//!
//! [`CacheManager`] is a thread-safe key/value store. Every entry carries its
//! own expiry; expired entries are never returned and are removed lazily on
//! access, by [`CacheManager::cleanup_expired`], or by the optional
//! background sweep started with [`CacheManager::start_cleanup`].

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::config::{CacheConfig, EvictionPolicy};
use super::stats::{CacheStats, MetricsCollector};
use crate::error::CommonResult;
use crate::resilience::{Clock, SystemClock};
use crate::time::PeriodicSweep;

/// Entry stored in the cache with expiry and eviction metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// Cached value
    pub data: V,
    /// Creation time in ms since epoch
    pub created_at_ms: u64,
    /// Expiry time in ms since epoch; the entry is stale once `now` passes it
    pub expires_at_ms: u64,
    /// TTL the entry was stored with, in whole seconds
    pub ttl_seconds: u64,
    /// Number of live hits served from this entry
    pub hit_count: u64,
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn new(data: V, now_ms: u64, ttl: Duration, seq: u64) -> Self {
        Self {
            data,
            created_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(duration_millis(ttl)),
            ttl_seconds: ttl.as_secs(),
            hit_count: 0,
            seq,
        }
    }

    /// Whether the entry is stale at `now_ms`
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }

    /// Time left before expiry, zero when already stale
    pub fn remaining_ttl(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.expires_at_ms.saturating_sub(now_ms))
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Internal storage for cache entries
#[derive(Debug)]
struct CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    entries: HashMap<K, CacheEntry<V>>,
    next_seq: u64,
}

impl<K, V> CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self { entries: HashMap::new(), next_seq: 0 }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq = self.next_seq.wrapping_add(1);
        self.next_seq
    }

    fn purge_expired(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        before - self.entries.len()
    }

    fn eviction_candidate(&self, policy: EvictionPolicy) -> Option<K> {
        let entries = self.entries.iter();
        let victim = match policy {
            EvictionPolicy::Lru => {
                entries.min_by_key(|(_, e)| (e.hit_count, e.created_at_ms, e.seq))
            }
            EvictionPolicy::Fifo => entries.min_by_key(|(_, e)| (e.created_at_ms, e.seq)),
        };
        victim.map(|(k, _)| k.clone())
    }
}

/// Generic thread-safe cache with TTL and LRU/FIFO eviction
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone`)
/// - `V`: Value type (must be `Clone + Serialize`; serialization is only used
///   to estimate memory in [`CacheStats::approx_bytes`])
/// - `C`: Clock type for time-based operations (defaults to `SystemClock`)
///
/// Clones share storage, statistics and the background sweep.
///
/// # Example
/// ```
/// use hubwire_common::cache::{CacheConfig, CacheManager};
///
/// let cache: CacheManager<String, i32> = CacheManager::new(CacheConfig::lru(100));
/// cache.set("key".to_string(), 42, None);
/// assert_eq!(cache.get(&"key".to_string()), Some(42));
/// ```
pub struct CacheManager<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
    C: Clock,
{
    storage: Arc<Mutex<CacheStorage<K, V>>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
    sweep: Arc<Mutex<Option<PeriodicSweep>>>,
}

impl<K, V, C> Clone for CacheManager<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
            sweep: Arc::clone(&self.sweep),
        }
    }
}

impl<K, V, C> std::fmt::Debug for CacheManager<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
    C: Clock,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .field("len", &self.storage.lock().entries.len())
            .finish()
    }
}

impl<K, V> CacheManager<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
{
    /// Create a new cache with the given configuration using system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> CacheManager<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
    C: Clock + Clone,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            storage: Arc::new(Mutex::new(CacheStorage::new())),
            config,
            metrics: MetricsCollector::new(),
            clock,
            sweep: Arc::new(Mutex::new(None)),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn now_ms(&self) -> u64 {
        self.clock.millis_since_epoch()
    }

    /// Get a value from the cache
    ///
    /// Returns `None` if the key doesn't exist, the entry has expired or the
    /// cache is disabled. A live hit bumps the entry's `hit_count`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_entry(key).map(|entry| entry.data)
    }

    /// Like [`CacheManager::get`] but returns a snapshot of the whole entry
    pub fn get_entry(&self, key: &K) -> Option<CacheEntry<V>> {
        if !self.config.enabled {
            return None;
        }
        let now = self.now_ms();
        let mut storage = self.storage.lock();

        let expired = match storage.entries.get(key) {
            None => {
                self.metrics.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            storage.entries.remove(key);
            self.metrics.record_expirations(1);
            self.metrics.record_miss();
            return None;
        }

        let entry = storage.entries.get_mut(key)?;
        entry.hit_count += 1;
        self.metrics.record_hit();
        Some(entry.clone())
    }

    /// Insert a value, using the configured default TTL when `ttl` is `None`
    ///
    /// If the cache is at capacity and `key` is new, one entry is evicted
    /// according to the configured policy first. Overwriting an existing key
    /// resets its hit count and creation time.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        if !self.config.enabled || self.config.max_size == 0 {
            return;
        }
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let now = self.now_ms();
        let mut storage = self.storage.lock();

        if !storage.entries.contains_key(&key) && storage.entries.len() >= self.config.max_size {
            self.evict_one(&mut storage);
        }

        let seq = storage.next_seq();
        storage.entries.insert(key, CacheEntry::new(value, now, ttl, seq));
        self.metrics.record_insert();
    }

    /// Remove an entry, returning whether one was present
    pub fn delete(&self, key: &K) -> bool {
        self.storage.lock().entries.remove(key).is_some()
    }

    /// Expiry-aware membership check that does not affect hit statistics
    pub fn has(&self, key: &K) -> bool {
        if !self.config.enabled {
            return false;
        }
        let now = self.now_ms();
        let mut storage = self.storage.lock();
        match storage.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => true,
            Some(_) => {
                storage.entries.remove(key);
                self.metrics.record_expirations(1);
                false
            }
            None => false,
        }
    }

    /// Remove every entry and reset statistics
    pub fn clear(&self) {
        self.storage.lock().entries.clear();
        self.metrics.reset();
    }

    /// Refresh an entry's expiry without touching its data
    ///
    /// Uses `new_ttl` when given, otherwise the TTL the entry was stored
    /// with. Returns false for missing or already expired keys.
    pub fn touch(&self, key: &K, new_ttl: Option<Duration>) -> bool {
        let now = self.now_ms();
        let mut storage = self.storage.lock();
        let Some(entry) = storage.entries.get_mut(key) else {
            return false;
        };
        if entry.is_expired(now) {
            storage.entries.remove(key);
            self.metrics.record_expirations(1);
            return false;
        }
        let ttl = new_ttl.unwrap_or_else(|| Duration::from_secs(entry.ttl_seconds));
        entry.expires_at_ms = now.saturating_add(duration_millis(ttl));
        entry.ttl_seconds = ttl.as_secs();
        true
    }

    /// Return the cached value or compute, store and return it
    ///
    /// Concurrent misses for the same key each run `factory`; the last
    /// write wins. Factory errors are returned and nothing is cached.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: K,
        factory: F,
        ttl: Option<Duration>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = factory().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Synchronous variant of [`CacheManager::get_or_set`] with an
    /// infallible factory
    pub fn get_or_insert_with<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = f();
        self.set(key, value.clone(), None);
        value
    }

    /// Remove expired entries
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.now_ms();
        let removed = self.storage.lock().purge_expired(now);
        if removed > 0 {
            self.metrics.record_expirations(removed);
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.metrics.snapshot(self.config.max_size);
        let storage = self.storage.lock();
        stats.size = storage.entries.len();
        stats.approx_bytes = storage
            .entries
            .values()
            .map(|entry| serde_json::to_vec(&entry.data).map(|bytes| bytes.len()).unwrap_or(0))
            .sum();
        stats.oldest_entry_ms = storage.entries.values().map(|e| e.created_at_ms).min();
        stats.newest_entry_ms = storage.entries.values().map(|e| e.created_at_ms).max();
        stats
    }

    /// Keys of all live entries
    pub fn keys(&self) -> Vec<K> {
        let now = self.now_ms();
        self.storage
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Remove every entry whose key matches `predicate`, returning the count
    pub fn remove_where<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let mut storage = self.storage.lock();
        let before = storage.entries.len();
        storage.entries.retain(|k, _| !predicate(k));
        before - storage.entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.storage.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the background sweep and drop every entry
    pub fn destroy(&self) {
        if let Some(sweep) = self.sweep.lock().take() {
            sweep.stop();
        }
        self.storage.lock().entries.clear();
    }

    /// Evict one entry based on the configured policy
    fn evict_one(&self, storage: &mut CacheStorage<K, V>) {
        if let Some(key) = storage.eviction_candidate(self.config.eviction_policy) {
            storage.entries.remove(&key);
            self.metrics.record_eviction();
            debug!(policy = ?self.config.eviction_policy, "Evicted cache entry");
        }
    }
}

impl<K, V, C> CacheManager<K, V, C>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Serialize + Send + 'static,
    C: Clock + Clone,
{
    /// Start the periodic expiry sweep on the current tokio runtime
    ///
    /// Calling it again while a sweep is running is a no-op.
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

        let storage = Arc::clone(&self.storage);
        let metrics = self.metrics.clone();
        let clock = self.clock.clone();
        let sweep = PeriodicSweep::spawn("cache-cleanup", self.config.cleanup_interval, move || {
            let removed = storage.lock().purge_expired(clock.millis_since_epoch());
            if removed > 0 {
                metrics.record_expirations(removed);
                debug!(removed, "Cache sweep purged expired entries");
            }
        })?;
        *slot = Some(sweep);
        Ok(())
    }

    /// Whether the background sweep is active
    pub fn is_cleanup_running(&self) -> bool {
        self.sweep.lock().as_ref().is_some_and(PeriodicSweep::is_running)
    }
}
