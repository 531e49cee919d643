//! Protocol handlers and their registry
//!
//! A [`ProtocolHandler`] turns an [`AdRequest`] into a protocol-neutral
//! [`AdResponse`]. Dispatch is by the tagged [`Protocol`] value the caller
//! passes; nothing is inferred from response payloads. Handlers own their
//! admission pipeline, so a capped user is rejected before any upstream
//! traffic happens.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::context::SessionContext;
use crate::error::{ProtocolError, Result};
use crate::middleware::{Delivery, Middleware, Pipeline, Terminal};
use crate::request::AdRequest;
use crate::tracking::TrackingDispatcher;
use crate::upstream::{Codec, Upstream};
use crate::vast::macros::error_code_for;
use crate::vast::{MediaFile, VastDocument, VastResolver};

/// Supported ad-serving protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vast,
    OpenRtb,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vast => write!(f, "vast"),
            Self::OpenRtb => write!(f, "openrtb"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vast" => Ok(Self::Vast),
            "openrtb" | "open_rtb" => Ok(Self::OpenRtb),
            other => Err(ProtocolError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// Tracking event kinds a handler can fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingEvent {
    Impression,
    Error(u32),
    Fallback,
}

/// Protocol-neutral delivery result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdResponse {
    pub protocol: Protocol,
    /// Selected creative, for protocols that pick one
    pub creative: Option<MediaFile>,
    /// Impression and event pixels to fire on render
    pub tracking_urls: Vec<String>,
    /// Error pixels to fire on playback failure
    pub error_urls: Vec<String>,
    /// Endpoints visited while producing the response
    pub chain: Vec<String>,
    pub used_fallback: bool,
    pub resolution_time_ms: u64,
    /// Protocol-specific payload (the OpenRTB bid response, for example)
    pub payload: Value,
}

/// One protocol's fetch, validation, and tracking behavior
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Reject structurally invalid requests before any network traffic
    fn validate_request(&self, request: &AdRequest) -> Result<()>;

    async fn fetch(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
    ) -> Result<Delivery<AdResponse>>;

    /// Fire tracking pixels for `event`; never fails
    async fn track(&self, event: TrackingEvent, urls: &[String], ctx: &SessionContext);
}

/// Pricing parameters must parse as decimals when present
fn validate_pricing(request: &AdRequest) -> Result<()> {
    for name in ["cost", "bid_price", "cpm"] {
        if request.get(name).is_some() && request.decimal_param(name).is_none() {
            return Err(ProtocolError::InvalidRequest(format!(
                "parameter {name} is not a decimal"
            )));
        }
    }
    Ok(())
}

/// VAST handler: admission pipeline in front of wrapper chain resolution
pub struct VastHandler {
    pipeline: Pipeline<VastDocument>,
    resolver: Arc<VastResolver>,
    dispatcher: Arc<TrackingDispatcher>,
}

impl VastHandler {
    /// Build a handler whose pipeline guards the resolver's primary upstream
    pub fn new(
        resolver: VastResolver,
        middlewares: Vec<Arc<dyn Middleware<VastDocument>>>,
        dispatcher: Arc<TrackingDispatcher>,
    ) -> Self {
        let resolver = Arc::new(resolver);
        let primary = Arc::new(resolver.primary().clone());
        let mut pipeline = Pipeline::new(primary as Arc<dyn Terminal<VastDocument>>);
        for middleware in middlewares {
            pipeline = pipeline.with(middleware);
        }
        Self {
            pipeline,
            resolver,
            dispatcher,
        }
    }
}

#[async_trait]
impl ProtocolHandler for VastHandler {
    fn protocol(&self) -> Protocol {
        Protocol::Vast
    }

    fn validate_request(&self, request: &AdRequest) -> Result<()> {
        validate_pricing(request)
    }

    async fn fetch(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
    ) -> Result<Delivery<AdResponse>> {
        // The first hop goes through admission control; redirects within
        // the chain are part of the same admitted request.
        let request = self.resolver.merged_request(request);
        let first = match self.pipeline.fetch(&request, ctx).await? {
            Delivery::Granted(doc) => doc,
            Delivery::Rejected(rejection) => return Ok(Delivery::Rejected(rejection)),
        };

        let result = self.resolver.resolve_seeded(first, &request, ctx).await;
        if !result.success {
            let error = result.error.unwrap_or(ProtocolError::AllUpstreamsFailed);
            let code = error_code_for(&error);
            tracing::warn!(
                "VAST resolution failed with code {code} after {} hop(s): {error}",
                result.chain.len()
            );
            self.dispatcher
                .dispatch_detached(Some(code), result.error_urls, ctx.clone());
            return Err(error);
        }

        Ok(Delivery::Granted(AdResponse {
            protocol: Protocol::Vast,
            creative: result.selected_creative,
            tracking_urls: result.tracking_urls,
            error_urls: result.error_urls,
            chain: result.chain,
            used_fallback: result.used_fallback,
            resolution_time_ms: result.resolution_time_ms,
            payload: Value::Null,
        }))
    }

    async fn track(&self, event: TrackingEvent, urls: &[String], ctx: &SessionContext) {
        match event {
            TrackingEvent::Impression => self.dispatcher.track_impressions(urls, ctx).await,
            TrackingEvent::Error(code) => self.dispatcher.track_error(code, urls, ctx).await,
            TrackingEvent::Fallback => self.dispatcher.track_fallback(urls, ctx).await,
        }
    }
}

/// Codec posting the request parameters as an OpenRTB bid request body
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRtbCodec;

impl Codec<Value> for OpenRtbCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::Decode(format!("invalid bid response JSON: {e}")))
    }

    fn encode(&self, request: &AdRequest) -> Result<Option<Bytes>> {
        let body = serde_json::to_vec(request.params())
            .map_err(|e| ProtocolError::Other(format!("bid request encoding failed: {e}")))?;
        Ok(Some(Bytes::from(body)))
    }
}

/// OpenRTB handler: JSON POST through the admission pipeline
pub struct OpenRtbHandler {
    pipeline: Pipeline<Value>,
    dispatcher: Arc<TrackingDispatcher>,
}

impl OpenRtbHandler {
    pub fn new(
        upstream: Upstream<Value>,
        middlewares: Vec<Arc<dyn Middleware<Value>>>,
        dispatcher: Arc<TrackingDispatcher>,
    ) -> Self {
        let mut pipeline = Pipeline::new(Arc::new(upstream) as Arc<dyn Terminal<Value>>);
        for middleware in middlewares {
            pipeline = pipeline.with(middleware);
        }
        Self {
            pipeline,
            dispatcher,
        }
    }

    /// Win-notice URLs from every bid in the response
    fn collect_nurls(payload: &Value) -> Vec<String> {
        let mut nurls = Vec::new();
        let seatbids = payload
            .get("seatbid")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for seatbid in seatbids {
            let bids = seatbid
                .get("bid")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for bid in bids {
                if let Some(nurl) = bid.get("nurl").and_then(Value::as_str) {
                    nurls.push(nurl.to_string());
                }
            }
        }
        nurls
    }
}

#[async_trait]
impl ProtocolHandler for OpenRtbHandler {
    fn protocol(&self) -> Protocol {
        Protocol::OpenRtb
    }

    fn validate_request(&self, request: &AdRequest) -> Result<()> {
        if request.str_param("id").is_none() {
            return Err(ProtocolError::MissingParameter("id"));
        }
        validate_pricing(request)
    }

    async fn fetch(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
    ) -> Result<Delivery<AdResponse>> {
        let payload = match self.pipeline.fetch(request, ctx).await? {
            Delivery::Granted(payload) => payload,
            Delivery::Rejected(rejection) => return Ok(Delivery::Rejected(rejection)),
        };

        Ok(Delivery::Granted(AdResponse {
            protocol: Protocol::OpenRtb,
            creative: None,
            tracking_urls: Self::collect_nurls(&payload),
            error_urls: Vec::new(),
            chain: Vec::new(),
            used_fallback: false,
            resolution_time_ms: 0,
            payload,
        }))
    }

    async fn track(&self, event: TrackingEvent, urls: &[String], ctx: &SessionContext) {
        match event {
            TrackingEvent::Impression | TrackingEvent::Fallback => {
                self.dispatcher.track_impressions(urls, ctx).await;
            }
            TrackingEvent::Error(code) => self.dispatcher.track_error(code, urls, ctx).await,
        }
    }
}

/// Handlers keyed by their protocol tag
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Protocol, Arc<dyn ProtocolHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own protocol tag, replacing any
    /// previous one
    #[must_use]
    pub fn with(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.handlers.insert(handler.protocol(), handler);
        self
    }

    pub fn get(&self, protocol: Protocol) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers.get(&protocol).cloned()
    }

    pub fn protocols(&self) -> Vec<Protocol> {
        self.handlers.keys().copied().collect()
    }
}
