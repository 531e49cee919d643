//! Error types for ad-serving protocol operations
//!
//! Admission-control rejections (frequency cap, budget) are *not* errors;
//! they travel as [`crate::middleware::Delivery::Rejected`] values. The
//! variants here cover transport, decode and programming failures.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status: {0}")]
    HttpStatus(StatusCode),

    #[error("Server error: {0}")]
    ServerError(StatusCode),

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Timeout")]
    Timeout,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Wrapper missing VASTAdTagURI")]
    MissingAdTagUri,

    #[error("Wrapper chain depth {depth} exceeded")]
    DepthExceeded { depth: u32 },

    #[error("All upstreams failed")]
    AllUpstreamsFailed,

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    Cache(#[from] vastkit_cache::CacheError),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ProtocolError {
    /// Check if error is retryable
    pub fn should_retry(&self) -> bool {
        match self {
            // Transient errors that should be retried
            Self::Network(_)
            | Self::ServerError(_)
            | Self::RateLimited
            | Self::ServiceUnavailable
            | Self::Timeout => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus(status) => {
                matches!(
                    status,
                    &StatusCode::TOO_MANY_REQUESTS
                        | &StatusCode::INTERNAL_SERVER_ERROR
                        | &StatusCode::BAD_GATEWAY
                        | &StatusCode::SERVICE_UNAVAILABLE
                        | &StatusCode::GATEWAY_TIMEOUT
                )
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(ProtocolError::Timeout.should_retry());
        assert!(ProtocolError::RateLimited.should_retry());
        assert!(ProtocolError::ServiceUnavailable.should_retry());
        assert!(ProtocolError::ServerError(StatusCode::BAD_GATEWAY).should_retry());
        assert!(ProtocolError::HttpStatus(StatusCode::TOO_MANY_REQUESTS).should_retry());
    }

    #[test]
    fn test_permanent_errors_are_not_retryable() {
        assert!(!ProtocolError::Parse("bad xml".to_string()).should_retry());
        assert!(!ProtocolError::MissingAdTagUri.should_retry());
        assert!(!ProtocolError::DepthExceeded { depth: 5 }.should_retry());
        assert!(!ProtocolError::MissingParameter("user_id").should_retry());
        assert!(!ProtocolError::HttpStatus(StatusCode::NOT_FOUND).should_retry());
    }

    #[test]
    fn test_display_carries_context() {
        let err = ProtocolError::DepthExceeded { depth: 5 };
        assert!(err.to_string().contains('5'));

        let err = ProtocolError::MissingParameter("user_id");
        assert!(err.to_string().contains("user_id"));
    }
}
