//! Ad-serving protocol client
//!
//! Client-side plumbing for requesting ads: pluggable transports, an
//! admission middleware pipeline (frequency capping and budget control),
//! VAST wrapper chain resolution with fallbacks, OpenRTB fetching, and
//! fire-and-forget tracking pixel dispatch, all behind a protocol-agnostic
//! [`AdClient`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vastkit_protocol::{
//!     AdClient, AdRequest, ClientConfig, HandlerRegistry, HttpTransport, Protocol,
//!     SessionContext, TrackingDispatcher, Upstream, VastChainConfig, VastCodec,
//!     VastHandler, VastResolver,
//! };
//!
//! # async fn example() -> vastkit_protocol::Result<()> {
//! let transport = Arc::new(HttpTransport::new()?);
//! let primary = Upstream::new(
//!     transport.clone(),
//!     Arc::new(VastCodec),
//!     "https://ads.example.com/vast",
//! );
//! let resolver = VastResolver::new(primary, VastChainConfig::default());
//! let dispatcher = Arc::new(TrackingDispatcher::new(
//!     transport,
//!     16,
//!     std::time::Duration::from_secs(3),
//! ));
//! let registry = HandlerRegistry::new()
//!     .with(Arc::new(VastHandler::new(resolver, Vec::new(), dispatcher)));
//!
//! let client = AdClient::new(ClientConfig::default(), registry)?;
//! client.start();
//!
//! let request = AdRequest::new().param("user_id", "alice").param("w", 1280);
//! let delivery = client
//!     .resolve(Protocol::Vast, &request, &SessionContext::new())
//!     .await?;
//! # let _ = delivery;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod request;
pub mod store;
pub mod tracking;
pub mod transport;
pub mod upstream;
pub mod vast;

pub use client::AdClient;
pub use config::ClientConfig;
pub use context::SessionContext;
pub use error::{ProtocolError, Result};
pub use handler::{
    AdResponse, HandlerRegistry, OpenRtbCodec, OpenRtbHandler, Protocol, ProtocolHandler,
    TrackingEvent, VastHandler,
};
pub use middleware::{
    BudgetConfig, BudgetMiddleware, Delivery, FrequencyCapConfig, FrequencyCapMiddleware,
    Middleware, Next, Pipeline, Rejection, Terminal,
};
pub use request::AdRequest;
pub use store::{
    Budget, BudgetStore, ChargeOutcome, FrequencyStore, FrequencyVerdict, MemoryStore,
    budget_key, frequency_key,
};
pub use tracking::TrackingDispatcher;
pub use transport::{FileTransport, HttpTransport, MemoryTransport, Transport};
pub use upstream::{Codec, Upstream, UpstreamOptions};
pub use vast::{
    MediaFile, SelectionStrategy, VastChainConfig, VastCodec, VastDocument, VastResolutionResult,
    VastResolver,
};
