//! Response caching for ad-serving clients
//!
//! This crate provides the cache layer used by `vastkit-protocol` to memoize
//! resolved ad responses:
//!
//! - Content-addressed keys: lowercase hex SHA-256 over a canonical JSON
//!   encoding of the request parameters, so the same parameters in any order
//!   produce the same key
//! - [`ResponseCache`]: a TTL-scoped, LRU-bounded in-memory store behind a
//!   single coarse mutex, with lazy expiry on read and an optional background
//!   reaper with explicit start/stop lifecycle
//! - [`CacheStats`]: hit/miss/eviction/expiration counters for monitoring
//!
//! A cache miss is a normal outcome and is reported as `None`, never as an
//! error.

pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod stats;

pub use config::ResponseCacheConfig;
pub use error::{CacheError, CacheResult};
pub use key::{ResponseKey, generate_key};
pub use memory::ResponseCache;
pub use stats::CacheStats;
