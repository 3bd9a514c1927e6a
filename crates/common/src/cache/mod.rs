//! TTL caches with capacity-bounded eviction
//!
//! # Features
//!
//! - **Thread-safe**: storage lives behind a `parking_lot::Mutex`; no lock
//!   is ever held across an `.await`
//! - **TTL per entry**: expired entries are never returned
//! - **Eviction**: LRU (fewest hits, then oldest) or FIFO (oldest)
//! - **Statistics**: hit/miss/eviction counters plus approximate memory
//! - **Background sweep**: optional periodic purge of expired entries
//! - **Two levels**: [`MultiLevelCacheManager`] layers an L1 over an L2
//! - **Testable**: clock abstraction for deterministic time-based tests
//!
//! # Examples
//!
//! ## Simple LRU Cache
//! ```
//! use hubwire_common::cache::{CacheConfig, CacheManager};
//!
//! let cache: CacheManager<String, i32> = CacheManager::new(CacheConfig::lru(100));
//! cache.set("key".to_string(), 42, None);
//! assert_eq!(cache.get(&"key".to_string()), Some(42));
//! ```
//!
//! ## Custom Configuration with Builder
//! ```
//! use std::time::Duration;
//!
//! use hubwire_common::cache::{CacheConfig, CacheManager, EvictionPolicy};
//!
//! let config = CacheConfig::builder()
//!     .max_size(500)
//!     .ttl(Duration::from_secs(1800))
//!     .eviction_policy(EvictionPolicy::Fifo)
//!     .build();
//!
//! let cache: CacheManager<String, i32> = CacheManager::new(config);
//! ```

pub mod config;
pub mod core;
pub mod multi_level;
pub mod stats;

pub use config::{CacheConfig, CacheConfigBuilder, EvictionPolicy};
pub use core::{CacheEntry, CacheManager};
pub use multi_level::{MultiLevelCacheManager, MultiLevelStats};
pub use stats::CacheStats;
