//! Cache statistics and metrics tracking
//!
//! This module provides types for tracking cache performance metrics
//! including hit rates, eviction counts, and expirations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Statistics snapshot for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,

    /// Maximum allowed entries (None = unlimited)
    pub max_size: Option<usize>,

    /// Reads that returned a live value
    pub hits: u64,

    /// Reads that found nothing or an expired entry
    pub misses: u64,

    /// Total number of writes
    pub sets: u64,

    /// Entries removed by `delete` or pattern invalidation
    pub deletes: u64,

    /// Entries removed to make room for a new key
    pub evictions: u64,

    /// Expired entries purged on read or sweep
    pub expirations: u64,

    /// `hits / (hits + misses)`, 0.0 before the first read
    pub hit_rate: f64,
}

impl CacheStats {
    /// Calculate miss rate (misses / total accesses)
    pub fn miss_rate(&self) -> f64 {
        if self.total_accesses() == 0 {
            0.0
        } else {
            1.0 - self.hit_rate
        }
    }

    /// Calculate fill percentage (size / max_size)
    pub fn fill_percentage(&self) -> Option<f64> {
        self.max_size.map(|max| if max == 0 { 0.0 } else { self.size as f64 / max as f64 })
    }

    /// Total number of read operations (hits + misses)
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Thread-safe metrics collector for cache operations
///
/// Counters are atomics so recording never contends with the storage lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct MetricsCollector {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set(&self) {
        self.inner.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deletes(&self, count: u64) {
        self.inner.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.inner.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.inner.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub(crate) fn snapshot(&self, size: usize, max_size: Option<usize>) -> CacheStats {
        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            size,
            max_size,
            hits,
            misses,
            sets: self.inner.sets.load(Ordering::Relaxed),
            deletes: self.inner.deletes.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            expirations: self.inner.expirations.load(Ordering::Relaxed),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    /// Reset all counters to zero
    pub(crate) fn reset(&self) {
        for counter in [
            &self.inner.hits,
            &self.inner.misses,
            &self.inner.sets,
            &self.inner.deletes,
            &self.inner.evictions,
            &self.inner.expirations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates the hit rate calculation scenario.
    ///
    /// Assertions:
    /// - Confirms `stats.hit_rate` equals `0.75` after 3 hits and 1 miss.
    /// - Confirms `stats.miss_rate()` equals `0.25`.
    #[test]
    fn test_hit_rate_snapshot() {
        let metrics = MetricsCollector::new();
        for _ in 0..3 {
            metrics.record_hit();
        }
        metrics.record_miss();

        let stats = metrics.snapshot(4, Some(10));
        assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
        assert!((stats.miss_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(stats.total_accesses(), 4);
        assert_eq!(stats.fill_percentage(), Some(0.4));
    }

    /// Validates the empty snapshot scenario.
    ///
    /// Assertions:
    /// - Ensures rates are zero before any reads.
    #[test]
    fn test_empty_snapshot_rates() {
        let stats = MetricsCollector::new().snapshot(0, None);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.miss_rate(), 0.0);
        assert_eq!(stats.fill_percentage(), None);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = MetricsCollector::new();
        let clone = metrics.clone();
        clone.record_set();
        clone.record_deletes(2);
        clone.record_expirations(3);

        let stats = metrics.snapshot(0, None);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.deletes, 2);
        assert_eq!(stats.expirations, 3);

        metrics.reset();
        assert_eq!(clone.snapshot(0, None), CacheStats::default());
    }
}
