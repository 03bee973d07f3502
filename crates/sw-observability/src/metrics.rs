//! Cache decision counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sw_cache::CacheStatus;

/// Counters for cache decisions and writes.
///
/// Shared between the pipeline and its spawned repopulation tasks.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    reloads: AtomicU64,
    passthrough: AtomicU64,
    network_errors: AtomicU64,
    writes_stored: AtomicU64,
    writes_skipped: AtomicU64,
    write_failures: AtomicU64,
    buckets_purged: AtomicU64,
}

/// Point-in-time view of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub reloads: u64,
    pub passthrough: u64,
    pub network_errors: u64,
    pub writes_stored: u64,
    pub writes_skipped: u64,
    pub write_failures: u64,
    pub buckets_purged: u64,
}

impl MetricsSnapshot {
    /// Requests answered from the cache.
    pub fn served_from_cache(&self) -> u64 {
        self.hits
    }

    /// Intercepted requests that went to the network.
    pub fn network_fetches(&self) -> u64 {
        self.misses + self.stale
    }

    /// Cache hit ratio over requests that consulted the cache.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.network_fetches();
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}

impl CacheMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the decision made for one request.
    pub fn record(&self, status: CacheStatus) {
        let counter = match status {
            CacheStatus::Hit => &self.hits,
            CacheStatus::Miss => &self.misses,
            CacheStatus::Stale => &self.stale,
            CacheStatus::Reload => &self.reloads,
            CacheStatus::Bypass => &self.passthrough,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_stored(&self) {
        self.writes_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_skipped(&self) {
        self.writes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_buckets_purged(&self, count: usize) {
        self.buckets_purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            writes_stored: self.writes_stored.load(Ordering::Relaxed),
            writes_skipped: self.writes_skipped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            buckets_purged: self.buckets_purged.load(Ordering::Relaxed),
        }
    }

    /// Serialize the current counters as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}
