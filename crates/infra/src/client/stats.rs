//! Client statistics
//!
//! ## Design
//! - **Atomic counters**, no locking on the request path
//! - **Snapshots** are plain serializable structs assembled on demand

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use repolink_common::cache::CacheStats;
use repolink_common::resilience::CircuitBreakerMetrics;
use serde::Serialize;

/// Request counters shared by every call on one client.
#[derive(Debug, Default)]
pub struct PerformanceStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    cache_hits: AtomicU64,
    retried_requests: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl PerformanceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished call. `attempts` is the number of transport
    /// attempts (0 for cache hits and calls rejected before sending).
    pub fn record(&self, success: bool, duration: Duration, attempts: u32) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        if attempts > 1 {
            self.retried_requests.fetch_add(1, Ordering::Relaxed);
        }
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.total_duration_ms.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self, duration: Duration) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.record(true, duration, 0);
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);
        PerformanceSnapshot {
            total_requests: total,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            retried_requests: self.retried_requests.load(Ordering::Relaxed),
            average_duration_ms: if total == 0 {
                0.0
            } else {
                total_duration_ms as f64 / total as f64
            },
        }
    }
}

/// Point-in-time view of [`PerformanceStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub retried_requests: u64,
    pub average_duration_ms: f64,
}

/// Everything `RepositoryClient::stats` reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub circuit_breaker: CircuitBreakerMetrics,
    /// `None` when caching is disabled.
    pub cache: Option<CacheStats>,
    pub performance: PerformanceSnapshot,
}
