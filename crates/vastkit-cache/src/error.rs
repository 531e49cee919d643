//! Error types for cache operations

use thiserror::Error;

/// Errors that can occur during cache operations
///
/// Lookups that simply find nothing return `Ok(None)` from the cache API;
/// these variants cover genuine failures only.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization error while deriving a key or encoding a value
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cache backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
