//! In-memory transport for tests and local development
//!
//! Routes endpoints to canned bodies or canned failures and records every
//! send for assertions. Used heavily by the chain-resolver tests, where
//! wrapper redirects point at arbitrary URLs no real server owns.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::Transport;
use crate::error::{ProtocolError, Result};

/// A send observed by the transport
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub endpoint: String,
    pub payload: Option<Bytes>,
    pub metadata: HashMap<String, String>,
}

/// Failure modes a canned endpoint can exhibit
#[derive(Debug, Clone)]
pub enum CannedFailure {
    Timeout,
    ServiceUnavailable,
    Other(String),
}

impl CannedFailure {
    fn to_error(&self) -> ProtocolError {
        match self {
            Self::Timeout => ProtocolError::Timeout,
            Self::ServiceUnavailable => ProtocolError::ServiceUnavailable,
            Self::Other(msg) => ProtocolError::Other(msg.clone()),
        }
    }
}

enum Route {
    Body(Bytes),
    Failure(CannedFailure),
}

/// Canned-response transport
#[derive(Default)]
pub struct MemoryTransport {
    routes: Mutex<HashMap<String, Route>>,
    sends: Mutex<Vec<RecordedSend>>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every send by `latency`, for deadline tests
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Serve `body` for `endpoint`
    pub fn respond(&self, endpoint: impl Into<String>, body: impl Into<Bytes>) {
        self.routes
            .lock()
            .insert(endpoint.into(), Route::Body(body.into()));
    }

    /// Fail `endpoint` with the given failure mode
    pub fn fail(&self, endpoint: impl Into<String>, failure: CannedFailure) {
        self.routes
            .lock()
            .insert(endpoint.into(), Route::Failure(failure));
    }

    /// All sends observed so far, in order
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().clone()
    }

    /// Number of sends observed
    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: Option<Bytes>,
        metadata: &HashMap<String, String>,
        _timeout: Duration,
    ) -> Result<Bytes> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.sends.lock().push(RecordedSend {
            endpoint: endpoint.to_string(),
            payload,
            metadata: metadata.clone(),
        });

        let routes = self.routes.lock();
        match routes.get(endpoint) {
            Some(Route::Body(body)) => Ok(body.clone()),
            Some(Route::Failure(failure)) => Err(failure.to_error()),
            None => Err(ProtocolError::Other(format!(
                "no canned response for {endpoint}"
            ))),
        }
    }
}
