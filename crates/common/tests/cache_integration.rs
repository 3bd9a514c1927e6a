//! Integration tests for cache module
//!
//! Tests eviction policies, TTL expiry, multi-level promotion and concurrent
//! access patterns through the public API only.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hubwire_common::cache::{CacheConfig, CacheManager, EvictionPolicy, MultiLevelCacheManager};
use hubwire_common::resilience::MockClock;

/// Verifies the TTL contract end to end.
///
/// # Test Steps
/// 1. Store a value with a one second TTL
/// 2. Read it back immediately
/// 3. Advance the clock past one second
/// 4. Verify `get` misses and `has` is false
#[test]
fn test_ttl_contract() {
    let clock = MockClock::starting_at_millis(1_000);
    let cache: CacheManager<String, String, MockClock> =
        CacheManager::with_clock(CacheConfig::default(), clock.clone());

    cache.set("k".to_string(), "v".to_string(), Some(Duration::from_secs(1)));
    assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));

    clock.advance_millis(1_100);
    assert_eq!(cache.get(&"k".to_string()), None);
    assert!(!cache.has(&"k".to_string()));
}

/// Verifies FIFO and LRU eviction with `max_size = 2`.
///
/// FIFO must evict the first-inserted key regardless of access pattern; LRU
/// must evict the key with the fewest hits even if it was inserted most
/// recently.
#[test]
fn test_eviction_policies_with_two_slots() {
    for policy in [EvictionPolicy::Fifo, EvictionPolicy::Lru] {
        let clock = MockClock::starting_at_millis(1_000);
        let config = CacheConfig::builder().max_size(2).eviction_policy(policy).build();
        let cache: CacheManager<&'static str, i32, MockClock> =
            CacheManager::with_clock(config, clock.clone());

        cache.set("first", 1, None);
        clock.advance_millis(1);
        cache.set("second", 2, None);
        cache.get(&"first");
        clock.advance_millis(1);
        cache.set("third", 3, None);

        match policy {
            EvictionPolicy::Fifo => {
                assert!(!cache.has(&"first"));
                assert!(cache.has(&"second"));
            }
            EvictionPolicy::Lru => {
                assert!(cache.has(&"first"));
                assert!(!cache.has(&"second"));
            }
        }
        assert!(cache.has(&"third"));
        assert_eq!(cache.stats().evictions, 1);
    }
}

/// Verifies that clones share storage and statistics across threads.
///
/// # Test Steps
/// 1. Spawn 8 threads that each write and read 100 keys through a clone
/// 2. Verify the final size and that every read was a hit
#[test]
fn test_concurrent_access_through_clones() {
    let cache: Arc<CacheManager<String, usize>> =
        Arc::new(CacheManager::new(CacheConfig::lru(10_000)));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("{t}-{i}");
                    cache.set(key.clone(), i, None);
                    assert_eq!(cache.get(&key), Some(i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.size, 800);
    assert_eq!(stats.hits, 800);
    assert_eq!(stats.misses, 0);
}

/// Verifies multi-level read-through with promotion into L1.
#[test]
fn test_multi_level_read_through() {
    let clock = MockClock::new();
    let cache: MultiLevelCacheManager<String, i32, MockClock> =
        MultiLevelCacheManager::with_clock(CacheConfig::lru(1), Some(CacheConfig::lru(100)), clock);

    for i in 0..5 {
        cache.set(format!("k{i}"), i, None);
    }
    assert_eq!(cache.l1().len(), 1);

    for i in 0..5 {
        assert_eq!(cache.get(&format!("k{i}")), Some(i));
    }
    let stats = cache.stats();
    assert_eq!(stats.l2.map(|s| s.size), Some(5));
    assert!(cache.l1().has(&"k4".to_string()));
}

/// Verifies the background sweep purges entries nobody re-reads.
#[tokio::test(start_paused = true)]
async fn test_background_sweep_purges_untouched_entries() {
    let clock = MockClock::new();
    let config = CacheConfig::builder().cleanup_interval(Duration::from_secs(60)).build();
    let cache: CacheManager<String, i32, MockClock> = CacheManager::with_clock(config, clock.clone());
    for i in 0..10 {
        cache.set(format!("k{i}"), i, Some(Duration::from_secs(1)));
    }
    cache.start_cleanup().unwrap();

    clock.advance_millis(2_000);
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert!(cache.is_empty());
    assert_eq!(cache.stats().expirations, 10);
    cache.destroy();
}
