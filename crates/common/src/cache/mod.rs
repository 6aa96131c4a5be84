//! Generic in-memory cache with per-entry TTL and bounded size
//!
//! # Features
//!
//! - **Thread-safe**: storage sits behind a `parking_lot::Mutex`, so a
//!   panicking reader never poisons the cache for everyone else
//! - **Per-entry TTL**: every `set` may override the configured default;
//!   expired entries are purged lazily on read or by `cleanup_expired`
//! - **Tagged eviction**: LRU or LFU, chosen once at construction
//! - **Pattern invalidation**: glob-style bulk deletes for string keys
//! - **Testable**: Clock abstraction for deterministic time-based testing
//!
//! # Examples
//!
//! ## Bounded LRU cache
//! ```
//! use repolink_common::cache::{Cache, CacheConfig};
//!
//! let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(100));
//! cache.set("key".to_string(), 42, None);
//! assert_eq!(cache.get(&"key".to_string()), Some(42));
//! ```
//!
//! ## Custom configuration with builder
//! ```
//! use std::time::Duration;
//!
//! use repolink_common::cache::{Cache, CacheConfig, EvictionPolicy};
//!
//! let config = CacheConfig::builder()
//!     .max_size(500)
//!     .default_ttl(Duration::from_secs(30))
//!     .eviction_policy(EvictionPolicy::Lfu)
//!     .build();
//!
//! let cache: Cache<String, Vec<u8>> = Cache::new(config);
//! cache.set("blob".to_string(), vec![1, 2, 3], Some(Duration::from_secs(5)));
//!
//! let stats = cache.stats();
//! assert_eq!(stats.sets, 1);
//! ```

mod config;
mod core;
mod stats;
pub mod utils;

// Re-export public API
pub use core::Cache;

pub use config::{CacheConfig, CacheConfigBuilder, EvictionPolicy};
pub use stats::CacheStats;
