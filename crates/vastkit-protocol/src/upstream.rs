//! Upstream endpoints: a transport, a codec, and an address
//!
//! An [`Upstream`] binds a [`Transport`] to a [`Codec`] and a concrete
//! endpoint. Protocol handlers fetch typed responses through it without
//! caring whether bytes travel over HTTP, a file, or canned test routes.
//! Wrapper redirects produce new upstreams via [`Upstream::rebind`], which
//! keeps the transport and codec but points at the redirect target.

use bytes::Bytes;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::context::SessionContext;
use crate::error::{ProtocolError, Result};
use crate::request::AdRequest;
use crate::transport::{PARAMS_METADATA_KEY, Transport};

/// Decodes upstream response bytes into a typed value, and optionally
/// encodes a request payload for POST-style protocols
pub trait Codec<T>: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<T>;

    /// Request body to send; `None` means a parameter-only GET
    fn encode(&self, request: &AdRequest) -> Result<Option<Bytes>> {
        let _ = request;
        Ok(None)
    }
}

/// Per-upstream defaults applied to every fetch
#[derive(Debug, Clone)]
pub struct UpstreamOptions {
    /// Timeout used when the caller does not override it
    pub default_timeout: Duration,
    /// Parameters merged under the request's own (request wins on conflict)
    pub default_params: BTreeMap<String, Value>,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(8),
            default_params: BTreeMap::new(),
            headers: HashMap::new(),
        }
    }
}

/// A typed endpoint reachable through a transport
pub struct Upstream<T> {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec<T>>,
    endpoint: String,
    options: UpstreamOptions,
}

impl<T> Clone for Upstream<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            codec: Arc::clone(&self.codec),
            endpoint: self.endpoint.clone(),
            options: self.options.clone(),
        }
    }
}

impl<T> Upstream<T> {
    pub fn new(
        transport: Arc<dyn Transport>,
        codec: Arc<dyn Codec<T>>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            codec,
            endpoint: endpoint.into(),
            options: UpstreamOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: UpstreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Same transport and codec, different endpoint
    #[must_use]
    pub fn rebind(&self, endpoint: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.endpoint = endpoint.into();
        next
    }

    /// Fetch and decode one response
    ///
    /// Merges the upstream's default parameters under the request's own,
    /// attaches the session correlator header, and applies `timeout` (falling
    /// back to the upstream default when `None`).
    pub async fn fetch(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let timeout = timeout.unwrap_or(self.options.default_timeout);

        let mut params = self.options.default_params.clone();
        for (name, value) in request.params() {
            params.insert(name.clone(), value.clone());
        }

        let payload = self.codec.encode(request)?;

        let mut metadata = self.options.headers.clone();
        metadata.insert("x-correlator".to_string(), ctx.correlator().to_string());
        // Parameters travel as query parameters only on parameter-style
        // requests; an encoded payload already carries them.
        if payload.is_none() && !params.is_empty() {
            let encoded = serde_json::to_string(&params)
                .map_err(|e| ProtocolError::Other(format!("parameter encoding failed: {e}")))?;
            metadata.insert(PARAMS_METADATA_KEY.to_string(), encoded);
        }
        let bytes = self
            .transport
            .send(&self.endpoint, payload, &metadata, timeout)
            .await?;
        self.codec.decode(&bytes)
    }
}

impl<T> std::fmt::Debug for Upstream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
