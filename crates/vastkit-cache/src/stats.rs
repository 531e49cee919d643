//! Cache statistics collection
//!
//! Counters are plain atomics updated on the hot path and snapshotted into
//! [`CacheStats`] for callers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters maintained by the cache itself
#[derive(Debug, Default)]
pub(crate) struct AtomicCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl AtomicCacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        if count > 0 {
            self.expirations.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self, entries: usize, memory_usage: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: entries as u64,
            memory_usage: memory_usage as u64,
        }
    }
}

/// Point-in-time cache statistics for monitoring
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Lookups that returned a live entry
    pub hits: u64,
    /// Lookups that found nothing (including lazily expired entries)
    pub misses: u64,
    /// Entries removed to keep the cache within its size bound
    pub evictions: u64,
    /// Entries removed because their TTL had passed
    pub expirations: u64,
    /// Live entries at snapshot time
    pub entries: u64,
    /// Estimated bytes held by live entries
    pub memory_usage: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64) / ((self.hits + self.misses) as f64) * 100.0
        }
    }
}
