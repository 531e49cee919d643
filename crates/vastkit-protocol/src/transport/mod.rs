//! Transport abstractions for ad-server communication
//!
//! A [`Transport`] moves opaque bytes to an endpoint and hands back the
//! response bytes; everything protocol-shaped (VAST XML, OpenRTB JSON) lives
//! above this boundary. Implementations are pluggable: HTTP for production,
//! in-memory and file transports for tests and local fixtures.
//!
//! Query parameters cross the boundary in a reserved [`PARAMS_METADATA_KEY`]
//! metadata entry holding a JSON object; transports that understand URLs merge
//! it into the request, others may ignore it.

mod file;
mod http;
mod memory;

pub use file::FileTransport;
pub use http::HttpTransport;
pub use memory::{CannedFailure, MemoryTransport, RecordedSend};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

/// Reserved metadata key carrying query parameters as a JSON object
pub const PARAMS_METADATA_KEY: &str = "_params";

/// Byte-level transport to an ad-serving endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` (GET when `None`) and return the response bytes
    async fn send(
        &self,
        endpoint: &str,
        payload: Option<Bytes>,
        metadata: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Bytes>;

    /// Release any held connections; default is a no-op
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
