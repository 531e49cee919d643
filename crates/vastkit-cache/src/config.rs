//! Configuration for the response cache

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCacheConfig {
    /// Maximum number of entries before LRU eviction kicks in
    pub max_size: usize,

    /// How often the background reaper purges expired entries
    pub cleanup_interval: Duration,

    /// TTL applied when the caller does not pass one explicitly
    pub default_ttl: Duration,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            cleanup_interval: Duration::from_secs(60),
            default_ttl: Duration::from_secs(300),
        }
    }
}

impl ResponseCacheConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            max_size: std::env::var("VASTKIT_CACHE_MAX_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
            cleanup_interval: Duration::from_secs(
                std::env::var("VASTKIT_CACHE_CLEANUP_INTERVAL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            default_ttl: Duration::from_secs(
                std::env::var("VASTKIT_CACHE_DEFAULT_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfiguration(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "cleanup_interval must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "default_ttl must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
