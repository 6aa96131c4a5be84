//! Core cache implementation with per-entry TTL and tagged eviction
//!
//! Each entry carries its own expiry. Capacity is enforced by an eviction
//! index selected at construction: LRU keeps entries ordered by a monotonic
//! access tick, LFU keeps them ordered by `(reads, insertion tick)`.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::config::{CacheConfig, EvictionPolicy};
use super::stats::{CacheStats, MetricsCollector};
use super::utils::KeyPattern;
use crate::resilience::{Clock, SystemClock};

/// Position of an entry inside the eviction index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rank {
    Recency(u64),
    Frequency { reads: u64, seq: u64 },
}

/// Ordered bookkeeping for the configured eviction policy
#[derive(Debug)]
enum EvictionIndex<K> {
    /// last-access tick -> key
    Lru(BTreeMap<u64, K>),
    /// (read count, insertion tick) -> key
    Lfu(BTreeMap<(u64, u64), K>),
}

impl<K: Clone> EvictionIndex<K> {
    fn new(policy: EvictionPolicy) -> Self {
        match policy {
            EvictionPolicy::Lru => Self::Lru(BTreeMap::new()),
            EvictionPolicy::Lfu => Self::Lfu(BTreeMap::new()),
        }
    }

    fn admit(&mut self, key: K, tick: u64) -> Rank {
        match self {
            Self::Lru(order) => {
                order.insert(tick, key);
                Rank::Recency(tick)
            }
            Self::Lfu(order) => {
                order.insert((0, tick), key);
                Rank::Frequency { reads: 0, seq: tick }
            }
        }
    }

    fn touch(&mut self, rank: &mut Rank, tick: u64) {
        match (self, *rank) {
            (Self::Lru(order), Rank::Recency(previous)) => {
                if let Some(key) = order.remove(&previous) {
                    order.insert(tick, key);
                }
                *rank = Rank::Recency(tick);
            }
            (Self::Lfu(order), Rank::Frequency { reads, seq }) => {
                if let Some(key) = order.remove(&(reads, seq)) {
                    order.insert((reads + 1, seq), key);
                }
                *rank = Rank::Frequency { reads: reads + 1, seq };
            }
            _ => {}
        }
    }

    fn forget(&mut self, rank: Rank) {
        match (self, rank) {
            (Self::Lru(order), Rank::Recency(tick)) => {
                order.remove(&tick);
            }
            (Self::Lfu(order), Rank::Frequency { reads, seq }) => {
                order.remove(&(reads, seq));
            }
            _ => {}
        }
    }

    fn victim(&self) -> Option<K> {
        match self {
            Self::Lru(order) => order.values().next().cloned(),
            Self::Lfu(order) => order.values().next().cloned(),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Lru(order) => order.clear(),
            Self::Lfu(order) => order.clear(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
    rank: Rank,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug)]
struct CacheStorage<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    index: EvictionIndex<K>,
    tick: u64,
}

impl<K, V> CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new(policy: EvictionPolicy) -> Self {
        Self { entries: HashMap::new(), index: EvictionIndex::new(policy), tick: 0 }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.index.forget(entry.rank);
        Some(entry)
    }
}

/// Generic thread-safe cache with per-entry TTL and bounded size
///
/// Cloning a `Cache` yields another handle onto the same storage.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use repolink_common::cache::{Cache, CacheConfig};
///
/// let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(100));
/// cache.set("key".to_string(), 42, Some(Duration::from_secs(5)));
/// assert_eq!(cache.get(&"key".to_string()), Some(42));
/// ```
pub struct Cache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: Arc<Mutex<CacheStorage<K, V>>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> Cache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache with the given configuration using system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> Cache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            storage: Arc::new(Mutex::new(CacheStorage::new(config.eviction_policy))),
            config,
            metrics: MetricsCollector::new(),
            clock,
        }
    }

    /// Configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store `value` under `key`
    ///
    /// `ttl` overrides the configured default TTL. Writing a new key into a
    /// full cache evicts exactly one entry chosen by the eviction policy;
    /// overwriting an existing key never evicts.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        if self.config.max_size == Some(0) {
            return;
        }

        let now = self.clock.now();
        let ttl = ttl.or(self.config.default_ttl);
        let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));

        let mut storage = self.storage.lock();
        let replaced = storage.remove(&key).is_some();

        if !replaced {
            if let Some(max_size) = self.config.max_size {
                if storage.entries.len() >= max_size {
                    self.evict_one(&mut storage);
                }
            }
        }

        let tick = storage.next_tick();
        let rank = storage.index.admit(key.clone(), tick);
        storage.entries.insert(key, CacheEntry { value, expires_at, rank });
        drop(storage);

        self.metrics.record_set();
    }

    /// Get a live value
    ///
    /// Returns `None` if the key is absent or expired. Expired entries are
    /// purged on the spot. A hit refreshes the entry's eviction rank.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        let Some(expired) = storage.entries.get(key).map(|entry| entry.is_expired(now)) else {
            drop(storage);
            self.metrics.record_miss();
            return None;
        };

        if expired {
            storage.remove(key);
            drop(storage);
            self.metrics.record_miss();
            self.metrics.record_expirations(1);
            return None;
        }

        let tick = storage.next_tick();
        let CacheStorage { entries, index, .. } = &mut *storage;
        let value = entries.get_mut(key).map(|entry| {
            index.touch(&mut entry.rank, tick);
            entry.value.clone()
        });
        drop(storage);

        if value.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
        value
    }

    /// Whether a live entry exists for `key`
    ///
    /// Does not count as a read and does not change eviction order.
    pub fn has(&self, key: &K) -> bool {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        match storage.entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(false) => true,
            Some(true) => {
                storage.remove(key);
                drop(storage);
                self.metrics.record_expirations(1);
                false
            }
            None => false,
        }
    }

    /// Remove `key`, returning whether an entry was present
    pub fn delete(&self, key: &K) -> bool {
        let removed = self.storage.lock().remove(key).is_some();
        if removed {
            self.metrics.record_deletes(1);
        }
        removed
    }

    /// Drop every entry, returning how many were held
    pub fn clear(&self) -> usize {
        let mut storage = self.storage.lock();
        let count = storage.entries.len();
        storage.entries.clear();
        storage.index.clear();
        drop(storage);

        self.metrics.record_deletes(count as u64);
        debug!(removed = count, "cache cleared");
        count
    }

    /// Get the current number of entries, including expired ones not yet
    /// purged
    pub fn len(&self) -> usize {
        self.storage.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        let expired: Vec<K> = storage
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            storage.remove(key);
        }
        drop(storage);

        if !expired.is_empty() {
            self.metrics.record_expirations(expired.len() as u64);
            trace!(expired = expired.len(), "purged expired cache entries");
        }
        expired.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.max_size)
    }

    fn evict_one(&self, storage: &mut CacheStorage<K, V>) {
        if let Some(victim) = storage.index.victim() {
            storage.remove(&victim);
            self.metrics.record_eviction();
            trace!(policy = ?self.config.eviction_policy, "evicted cache entry");
        }
    }
}

impl<K, V, C> Cache<K, V, C>
where
    K: Eq + Hash + Clone + AsRef<str>,
    V: Clone,
    C: Clock + Clone,
{
    /// Delete every key matching a glob pattern (`*` and `?` wildcards)
    ///
    /// Returns the number of entries removed.
    ///
    /// # Example
    /// ```
    /// use repolink_common::cache::{Cache, CacheConfig};
    ///
    /// let cache: Cache<String, u8> = Cache::new(CacheConfig::lru(10));
    /// cache.set("user:1".to_string(), 1, None);
    /// cache.set("user:2".to_string(), 2, None);
    /// cache.set("team:1".to_string(), 3, None);
    ///
    /// assert_eq!(cache.invalidate_pattern("user:*"), 2);
    /// assert!(cache.has(&"team:1".to_string()));
    /// ```
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let pattern = KeyPattern::new(pattern);
        let mut storage = self.storage.lock();

        let matching: Vec<K> =
            storage.entries.keys().filter(|key| pattern.matches(key.as_ref())).cloned().collect();

        for key in &matching {
            storage.remove(key);
        }
        drop(storage);

        self.metrics.record_deletes(matching.len() as u64);
        debug!(pattern = pattern.as_str(), removed = matching.len(), "cache pattern invalidated");
        matching.len()
    }
}

impl<K, V, C> Clone for Cache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<K, V, C> std::fmt::Debug for Cache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::core.
    use std::thread;

    use super::*;
    use crate::resilience::MockClock;

    fn key(s: &str) -> String {
        s.to_string()
    }

    /// Validates `Cache::new` behavior for the cache new scenario.
    ///
    /// Assertions:
    /// - Confirms `cache.len()` equals `0`.
    /// - Ensures `cache.is_empty()` evaluates to true.
    #[test]
    fn test_cache_new() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::default());
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    /// Validates the set and get round trip.
    ///
    /// Assertions:
    /// - Confirms stored values come back unchanged.
    /// - Confirms unknown keys miss.
    #[test]
    fn test_cache_set_and_get() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(10));

        cache.set(key("key1"), 42, None);
        cache.set(key("key2"), 84, None);

        assert_eq!(cache.get(&key("key1")), Some(42));
        assert_eq!(cache.get(&key("key2")), Some(84));
        assert_eq!(cache.get(&key("key3")), None);
        assert_eq!(cache.len(), 2);
    }

    /// Validates overwrite of an existing key.
    ///
    /// Assertions:
    /// - Confirms the new value replaces the old one.
    /// - Confirms a full cache does not evict on overwrite.
    #[test]
    fn test_cache_overwrite_does_not_evict() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(2));

        cache.set(key("a"), 1, None);
        cache.set(key("b"), 2, None);
        cache.set(key("a"), 10, None);

        assert_eq!(cache.get(&key("a")), Some(10));
        assert_eq!(cache.get(&key("b")), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    /// Validates per-entry TTL against the mock clock.
    ///
    /// Assertions:
    /// - Confirms the value is served before its deadline.
    /// - Confirms it is absent once `now >= expires_at`.
    /// - Confirms the expiry is counted.
    #[test]
    fn test_cache_entry_expires_at_deadline() {
        let clock = MockClock::new();
        let cache: Cache<String, i32, MockClock> =
            Cache::with_clock(CacheConfig::lru(10), clock.clone());

        cache.set(key("a"), 1, Some(Duration::from_millis(1000)));

        clock.advance_millis(999);
        assert_eq!(cache.get(&key("a")), Some(1));

        clock.advance_millis(1);
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.len(), 0);

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    /// Validates the default TTL fallback.
    ///
    /// Assertions:
    /// - Confirms entries without an explicit TTL use the configured default.
    /// - Confirms an explicit TTL overrides the default.
    #[test]
    fn test_cache_default_ttl_applies() {
        let clock = MockClock::new();
        let config = CacheConfig::builder().max_size(10).default_ttl(Duration::from_secs(5)).build();
        let cache: Cache<String, i32, MockClock> = Cache::with_clock(config, clock.clone());

        cache.set(key("default"), 1, None);
        cache.set(key("long"), 2, Some(Duration::from_secs(60)));

        clock.advance(Duration::from_secs(5));
        assert!(!cache.has(&key("default")));
        assert!(cache.has(&key("long")));
    }

    /// Validates LRU eviction of exactly one entry.
    ///
    /// Assertions:
    /// - Confirms the least recently read key is evicted.
    /// - Confirms exactly one eviction is recorded.
    #[test]
    fn test_cache_lru_eviction() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(3));

        cache.set(key("a"), 1, None);
        cache.set(key("b"), 2, None);
        cache.set(key("c"), 3, None);

        // "a" becomes most recent, "b" is now the oldest access
        let _ = cache.get(&key("a"));
        cache.set(key("d"), 4, None);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&key("b")), None);
        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.get(&key("c")), Some(3));
        assert_eq!(cache.get(&key("d")), Some(4));
        assert_eq!(cache.stats().evictions, 1);
    }

    /// Validates LFU eviction and its tie break.
    ///
    /// Assertions:
    /// - Confirms the least read key is evicted.
    /// - Confirms ties go to the oldest insertion.
    #[test]
    fn test_cache_lfu_eviction() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lfu(3));

        cache.set(key("a"), 1, None);
        cache.set(key("b"), 2, None);
        cache.set(key("c"), 3, None);

        for _ in 0..3 {
            let _ = cache.get(&key("a"));
        }
        let _ = cache.get(&key("c"));

        // "b" has zero reads
        cache.set(key("d"), 4, None);
        assert!(!cache.has(&key("b")));

        // "d" (0 reads) is the only zero-read entry left
        cache.set(key("e"), 5, None);
        assert!(!cache.has(&key("d")));
        assert!(cache.has(&key("a")));
        assert!(cache.has(&key("c")));
        assert!(cache.has(&key("e")));
    }

    #[test]
    fn test_cache_lfu_tie_breaks_on_insertion_order() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lfu(2));

        cache.set(key("old"), 1, None);
        cache.set(key("new"), 2, None);
        let _ = cache.get(&key("old"));
        let _ = cache.get(&key("new"));

        cache.set(key("third"), 3, None);
        assert!(!cache.has(&key("old")));
        assert!(cache.has(&key("new")));
    }

    /// Validates delete and clear.
    ///
    /// Assertions:
    /// - Confirms `delete` reports presence.
    /// - Confirms `clear` returns the number of dropped entries.
    #[test]
    fn test_cache_delete_and_clear() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(10));

        cache.set(key("a"), 1, None);
        cache.set(key("b"), 2, None);
        cache.set(key("c"), 3, None);

        assert!(cache.delete(&key("a")));
        assert!(!cache.delete(&key("a")));
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().deletes, 3);

        // The index is cleared too, so refilling does not evict phantoms
        for i in 0..10 {
            cache.set(format!("k{i}"), i, None);
        }
        assert_eq!(cache.stats().evictions, 0);
    }

    /// Validates pattern invalidation.
    ///
    /// Assertions:
    /// - Confirms all and only matching keys are removed.
    #[test]
    fn test_cache_invalidate_pattern() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(10));

        cache.set(key("user:1"), 1, None);
        cache.set(key("user:2"), 2, None);
        cache.set(key("users"), 3, None);
        cache.set(key("team:user:1"), 4, None);

        assert_eq!(cache.invalidate_pattern("user:*"), 2);
        assert!(!cache.has(&key("user:1")));
        assert!(!cache.has(&key("user:2")));
        assert!(cache.has(&key("users")));
        assert!(cache.has(&key("team:user:1")));
        assert_eq!(cache.invalidate_pattern("nothing*"), 0);
    }

    /// Validates expired entry sweeping.
    ///
    /// Assertions:
    /// - Confirms only expired entries are removed.
    #[test]
    fn test_cache_cleanup_expired() {
        let clock = MockClock::new();
        let cache: Cache<String, i32, MockClock> =
            Cache::with_clock(CacheConfig::lru(10), clock.clone());

        cache.set(key("short"), 1, Some(Duration::from_millis(10)));
        cache.set(key("short2"), 2, Some(Duration::from_millis(10)));
        cache.set(key("forever"), 3, None);

        clock.advance_millis(10);
        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_cache_has_does_not_count_reads() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(10));
        cache.set(key("a"), 1, None);

        assert!(cache.has(&key("a")));
        assert!(!cache.has(&key("b")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_cache_zero_capacity_stores_nothing() {
        let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(0));
        cache.set(key("a"), 1, None);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("a")), None);
    }

    /// Validates concurrent writers stay within capacity.
    ///
    /// Assertions:
    /// - Confirms `cache.len()` never exceeds `max_size`.
    #[test]
    fn test_cache_concurrent_writers_respect_capacity() {
        let cache: Cache<String, usize> = Cache::new(CacheConfig::lru(50));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        cache.set(format!("{t}:{i}"), i, None);
                        let _ = cache.get(&format!("{t}:{}", i / 2));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 50);
        let stats = cache.stats();
        assert_eq!(stats.sets, 800);
        assert_eq!(stats.evictions, 750);
    }
}
