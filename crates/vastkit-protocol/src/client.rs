//! Ad client orchestrator
//!
//! Ties the pieces together: cache lookup first, then dispatch to the
//! registered handler for the requested protocol, then caching of granted
//! responses. Rejections are never cached; a capped user must be re-checked
//! on the next request.

use bytes::Bytes;
use vastkit_cache::{ResponseCache, ResponseKey};

use crate::config::ClientConfig;
use crate::context::SessionContext;
use crate::error::{ProtocolError, Result};
use crate::handler::{AdResponse, HandlerRegistry, Protocol};
use crate::middleware::Delivery;
use crate::request::AdRequest;

/// Protocol-agnostic entry point for ad delivery
pub struct AdClient {
    registry: HandlerRegistry,
    cache: ResponseCache,
    config: ClientConfig,
}

impl AdClient {
    pub fn new(config: ClientConfig, registry: HandlerRegistry) -> Result<Self> {
        config.validate()?;
        let cache = ResponseCache::new(config.cache.clone())?;
        Ok(Self {
            registry,
            cache,
            config,
        })
    }

    /// Start background work (the cache reaper)
    pub fn start(&self) {
        self.cache.start();
    }

    /// Stop background work; waits for the reaper to exit
    pub async fn shutdown(&self) {
        self.cache.stop().await;
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Resolve one ad request through the handler for `protocol`
    ///
    /// Identical requests within the response TTL are served from cache
    /// without touching admission control or the upstream.
    pub async fn resolve(
        &self,
        protocol: Protocol,
        request: &AdRequest,
        ctx: &SessionContext,
    ) -> Result<Delivery<AdResponse>> {
        let handler = self
            .registry
            .get(protocol)
            .ok_or_else(|| ProtocolError::UnsupportedProtocol(protocol.to_string()))?;
        handler.validate_request(request)?;

        let key = Self::response_key(protocol, request)?;
        if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_slice::<AdResponse>(&cached) {
                Ok(response) => {
                    tracing::debug!("Serving cached response for request {}", ctx.request_id());
                    return Ok(Delivery::Granted(response));
                }
                Err(e) => {
                    tracing::warn!("Dropping undecodable cache entry {key}: {e}");
                    self.cache.remove(&key);
                }
            }
        }

        let delivery = handler.fetch(request, ctx).await?;
        if let Delivery::Granted(response) = &delivery {
            match serde_json::to_vec(response) {
                Ok(encoded) => self.cache.set(
                    key,
                    Bytes::from(encoded),
                    Some(self.config.response_ttl),
                ),
                Err(e) => tracing::warn!("Response not cacheable: {e}"),
            }
        }
        Ok(delivery)
    }

    fn response_key(protocol: Protocol, request: &AdRequest) -> Result<String> {
        let mut key = ResponseKey::new().arg(protocol.to_string());
        for (name, value) in request.params() {
            key = key.kwarg(name.clone(), value.clone());
        }
        Ok(key.hex_digest()?)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_response_key_is_stable_and_protocol_scoped() {
        let request = AdRequest::new().param("user_id", "alice").param("w", 640);
        let again = AdRequest::new().param("w", 640).param("user_id", "alice");

        let vast_key = AdClient::response_key(Protocol::Vast, &request)
            .expect("Operation should succeed");
        let vast_key_again = AdClient::response_key(Protocol::Vast, &again)
            .expect("Operation should succeed");
        let rtb_key = AdClient::response_key(Protocol::OpenRtb, &request)
            .expect("Operation should succeed");

        assert_eq!(vast_key, vast_key_again);
        assert_ne!(vast_key, rtb_key);
    }

    #[tokio::test]
    async fn test_unknown_protocol_is_an_error() {
        let client = AdClient::new(ClientConfig::default(), HandlerRegistry::new())
            .expect("Operation should succeed");
        let result = client
            .resolve(Protocol::Vast, &AdRequest::new(), &SessionContext::new())
            .await;
        assert!(matches!(
            result,
            Err(ProtocolError::UnsupportedProtocol(_))
        ));
    }
}
