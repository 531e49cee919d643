//! In-memory TTL + LRU response cache
//!
//! One coarse mutex guards a single map, which keeps the read-check-write
//! sequences of concurrent callers atomic with respect to each other. Every
//! hit bumps the entry to most-recently-used; `set` evicts from the
//! least-recently-used end once the size bound is exceeded.
//!
//! Expiry is enforced twice: lazily on `get` (an expired entry is removed the
//! moment it is observed) and by an optional background reaper that wakes on
//! a fixed interval. Correctness never depends on the reaper running; it only
//! bounds how long dead entries occupy memory. Reaper lifecycle is explicit:
//! [`ResponseCache::start`] spawns it, [`ResponseCache::stop`] shuts it down
//! cooperatively.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::ResponseCacheConfig;
use crate::error::CacheResult;
use crate::stats::{AtomicCacheStats, CacheStats};

/// A cached value together with its expiry and LRU bookkeeping
#[derive(Debug)]
struct CacheEntry {
    value: Bytes,
    expires_at: Instant,
    size_estimate: usize,
    /// Monotonic touch sequence; the smallest value is the LRU candidate
    last_touched: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    touch_seq: u64,
    memory_usage: usize,
}

struct Shared {
    state: Mutex<State>,
    stats: AtomicCacheStats,
    config: ResponseCacheConfig,
}

struct Reaper {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

/// TTL-scoped, LRU-bounded cache for resolved ad responses
pub struct ResponseCache {
    shared: Arc<Shared>,
    reaper: Mutex<Option<Reaper>>,
}

impl ResponseCache {
    /// Create a cache with the given configuration
    pub fn new(config: ResponseCacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                stats: AtomicCacheStats::default(),
                config,
            }),
            reaper: Mutex::new(None),
        })
    }

    /// Look up a value; `None` means miss (absent or expired)
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let mut state = self.shared.state.lock();

        let expired = match state.entries.get(key) {
            None => {
                self.shared.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            if let Some(entry) = state.entries.remove(key) {
                state.memory_usage -= entry.size_estimate;
            }
            self.shared.stats.record_expirations(1);
            self.shared.stats.record_miss();
            return None;
        }

        state.touch_seq += 1;
        let seq = state.touch_seq;
        let entry = state.entries.get_mut(key)?;
        entry.last_touched = seq;
        self.shared.stats.record_hit();
        Some(entry.value.clone())
    }

    /// Store a value under `key` for `ttl` (the configured default when `None`)
    ///
    /// Evicts least-recently-touched entries until the cache is back within
    /// its size bound, counting one eviction per removed entry.
    pub fn set(&self, key: impl Into<String>, value: Bytes, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.shared.config.default_ttl);
        let now = Instant::now();
        let mut state = self.shared.state.lock();

        state.touch_seq += 1;
        let entry = CacheEntry {
            size_estimate: value.len(),
            value,
            expires_at: now + ttl,
            last_touched: state.touch_seq,
        };

        let key = key.into();
        state.memory_usage += entry.size_estimate;
        if let Some(previous) = state.entries.insert(key, entry) {
            state.memory_usage -= previous.size_estimate;
        }

        while state.entries.len() > self.shared.config.max_size {
            let lru_key = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_touched)
                .map(|(key, _)| key.clone());
            let Some(lru_key) = lru_key else { break };
            if let Some(entry) = state.entries.remove(&lru_key) {
                state.memory_usage -= entry.size_estimate;
                self.shared.stats.record_eviction();
                tracing::debug!("Evicted LRU cache entry {lru_key}");
            }
        }
    }

    /// Remove a single entry, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.shared.state.lock();
        match state.entries.remove(key) {
            Some(entry) => {
                state.memory_usage -= entry.size_estimate;
                true
            }
            None => false,
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.entries.clear();
        state.memory_usage = 0;
    }

    /// Current number of live entries
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        self.shared
            .stats
            .snapshot(state.entries.len(), state.memory_usage)
    }

    /// Start the background reaper; a second call is a no-op
    pub fn start(&self) {
        let mut reaper = self.reaper.lock();
        if reaper.is_some() {
            return;
        }

        let shutdown = Arc::new(Notify::new());
        let shared = Arc::clone(&self.shared);
        let task_shutdown = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(shared.config.cleanup_interval);
            loop {
                tokio::select! {
                    () = task_shutdown.notified() => break,
                    _ = interval.tick() => Self::purge_expired(&shared),
                }
            }
        });

        *reaper = Some(Reaper { handle, shutdown });
    }

    /// Stop the background reaper, waiting for it to wind down
    ///
    /// Cooperative: the task observes the shutdown signal at its next
    /// suspension point. Safe to call without a prior `start`.
    pub async fn stop(&self) {
        let reaper = self.reaper.lock().take();
        if let Some(Reaper { handle, shutdown }) = reaper {
            shutdown.notify_one();
            let _ = handle.await;
        }
    }

    fn purge_expired(shared: &Shared) {
        let now = Instant::now();
        let mut state = shared.state.lock();

        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let removed = expired.len() as u64;
        for key in expired {
            if let Some(entry) = state.entries.remove(&key) {
                state.memory_usage -= entry.size_estimate;
            }
        }

        if removed > 0 {
            shared.stats.record_expirations(removed);
            tracing::debug!("Reaper purged {removed} expired cache entries");
        }
    }
}
