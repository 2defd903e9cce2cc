//! Counters and gauges exposed by a cache instance.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Point-in-time snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Successful writes.
    pub writes: u64,
    /// Entries dropped because the payload store evicted them.
    pub evictions: u64,
    /// Entries removed by `evict` or `invalidate`.
    pub invalidations: u64,
    /// Entries replaced by an overlapping write.
    pub superseded: u64,
    /// Live entries in the valid-time index.
    pub valid_entries: usize,
    /// Live entries in the transaction-time index.
    pub transaction_entries: usize,
    /// Payloads held by the store.
    pub stored_payloads: usize,
    /// Threads blocked on the cache lock.
    pub lock_queue_depth: usize,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Live counters; updated without taking the cache lock.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub writes: AtomicU64,
    pub evictions: AtomicU64,
    pub invalidations: AtomicU64,
    pub superseded: AtomicU64,
    pub valid_entries: AtomicUsize,
    pub transaction_entries: AtomicUsize,
}

impl Counters {
    pub fn add(counter: &AtomicU64, n: usize) {
        if n > 0 {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            valid_entries: self.valid_entries.load(Ordering::Relaxed),
            transaction_entries: self.transaction_entries.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}
