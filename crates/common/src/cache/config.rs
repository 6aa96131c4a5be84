//! Cache configuration types and builder patterns
//!
//! This module provides configuration types for customizing cache behavior,
//! including the eviction policy, default TTL, and size limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Eviction policy applied when an insert would exceed capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least Recently Used - evicts the entry with the oldest last access
    #[default]
    Lru,
    /// Least Frequently Used - evicts the entry with the fewest reads,
    /// oldest insertion first on ties
    Lfu,
}

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries (None = unlimited)
    pub max_size: Option<usize>,

    /// TTL applied when `set` is called without one (None = no expiration)
    pub default_ttl: Option<Duration>,

    /// Eviction policy when max_size is reached
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: Some(1000),
            default_ttl: Some(Duration::from_secs(300)),
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for an unbounded TTL-only cache
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use repolink_common::cache::CacheConfig;
    ///
    /// let config = CacheConfig::ttl(Duration::from_secs(60));
    /// assert_eq!(config.max_size, None);
    /// ```
    pub fn ttl(duration: Duration) -> Self {
        Self { max_size: None, default_ttl: Some(duration), eviction_policy: EvictionPolicy::Lru }
    }

    /// Quick preset for a bounded LRU cache without expiry
    pub fn lru(max_size: usize) -> Self {
        Self { max_size: Some(max_size), default_ttl: None, eviction_policy: EvictionPolicy::Lru }
    }

    /// Quick preset for a bounded LFU cache without expiry
    pub fn lfu(max_size: usize) -> Self {
        Self { max_size: Some(max_size), default_ttl: None, eviction_policy: EvictionPolicy::Lfu }
    }

    /// Combined TTL + LRU cache
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use repolink_common::cache::CacheConfig;
    ///
    /// let config = CacheConfig::ttl_lru(Duration::from_secs(300), 500);
    /// assert_eq!(config.max_size, Some(500));
    /// ```
    pub fn ttl_lru(ttl: Duration, max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            default_ttl: Some(ttl),
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of entries
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = Some(size);
        self
    }

    /// Remove the capacity bound
    pub fn unbounded(mut self) -> Self {
        self.config.max_size = None;
        self
    }

    /// Set the TTL used when `set` receives none
    pub fn default_ttl(mut self, duration: Duration) -> Self {
        self.config.default_ttl = Some(duration);
        self
    }

    /// Entries written without an explicit TTL never expire
    pub fn no_expiry(mut self) -> Self {
        self.config.default_ttl = None;
        self
    }

    /// Set eviction policy
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
