//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vastkit_cache::ResponseCacheConfig;

use crate::error::{ProtocolError, Result};

/// Top-level configuration for an [`crate::client::AdClient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TTL applied to cached ad responses
    pub response_ttl: Duration,

    /// Response cache sizing and reaping
    pub cache: ResponseCacheConfig,

    /// Default timeout for upstream requests
    pub request_timeout: Duration,

    /// Connection establishment timeout for dedicated HTTP transports
    pub connect_timeout: Duration,

    /// Maximum tracking pixels in flight at once
    pub tracking_concurrency: usize,

    /// Timeout applied to each tracking pixel
    pub tracking_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_ttl: Duration::from_secs(300),
            cache: ResponseCacheConfig::default(),
            request_timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(10),
            tracking_concurrency: 16,
            tracking_timeout: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            response_ttl: Duration::from_secs(
                std::env::var("VASTKIT_RESPONSE_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            cache: ResponseCacheConfig::from_env(),
            request_timeout: Duration::from_secs(
                std::env::var("VASTKIT_REQUEST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("VASTKIT_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            tracking_concurrency: std::env::var("VASTKIT_TRACKING_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            tracking_timeout: Duration::from_secs(
                std::env::var("VASTKIT_TRACKING_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            ),
        }
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.response_ttl.is_zero() {
            return Err(ProtocolError::InvalidRequest(
                "response_ttl must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ProtocolError::InvalidRequest(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.tracking_concurrency == 0 {
            return Err(ProtocolError::InvalidRequest(
                "tracking_concurrency must be greater than zero".to_string(),
            ));
        }
        self.cache.validate()?;
        Ok(())
    }
}
