//! HTTP transport backed by a shared pooled reqwest client

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use url::Url;

use super::{PARAMS_METADATA_KEY, Transport};
use crate::error::{ProtocolError, Result};

/// Global shared HTTP client; avoids costly client creation per transport
static GLOBAL_HTTP_CLIENT: OnceLock<Arc<Client>> = OnceLock::new();

/// HTTP transport with pooled connections and ad-serving timeouts
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
}

impl HttpTransport {
    /// Create a transport over the shared pooled client
    pub fn new() -> Result<Self> {
        let client = GLOBAL_HTTP_CLIENT.get_or_init(|| {
            Arc::new(
                Self::build_client(Duration::from_secs(30), Duration::from_secs(10))
                    .unwrap_or_else(|_| Client::new()),
            )
        });

        Ok(Self {
            client: Arc::clone(client),
        })
    }

    /// Create a transport with its own client and explicit timeouts
    pub fn with_timeouts(request_timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Arc::new(Self::build_client(request_timeout, connect_timeout)?),
        })
    }

    fn build_client(request_timeout: Duration, connect_timeout: Duration) -> Result<Client> {
        ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .tcp_nodelay(true)
            .use_rustls_tls()
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent("vastkit-protocol/0.2.0")
            .build()
            .map_err(Into::into)
    }

    fn apply_params(endpoint: &str, metadata: &HashMap<String, String>) -> Result<Url> {
        let mut url = Url::parse(endpoint)
            .map_err(|e| ProtocolError::InvalidRequest(format!("invalid endpoint URL: {e}")))?;

        if let Some(raw) = metadata.get(PARAMS_METADATA_KEY) {
            let params: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
                .map_err(|e| {
                    ProtocolError::InvalidRequest(format!("malformed {PARAMS_METADATA_KEY}: {e}"))
                })?;
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &params {
                match value {
                    serde_json::Value::String(s) => pairs.append_pair(name, s),
                    other => pairs.append_pair(name, &other.to_string()),
                };
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: Option<Bytes>,
        metadata: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Bytes> {
        let url = Self::apply_params(endpoint, metadata)?;
        tracing::debug!("HTTP request: {url}");

        let mut request = match payload {
            Some(body) => self.client.post(url).body(body),
            None => self.client.get(url),
        };
        for (name, value) in metadata {
            if name != PARAMS_METADATA_KEY {
                request = request.header(name, value);
            }
        }

        let response = request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ProtocolError::Timeout
            } else {
                ProtocolError::Http(e)
            }
        })?;

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?),
            StatusCode::TOO_MANY_REQUESTS => Err(ProtocolError::RateLimited),
            StatusCode::SERVICE_UNAVAILABLE => Err(ProtocolError::ServiceUnavailable),
            status if status.is_server_error() => Err(ProtocolError::ServerError(status)),
            status => Err(ProtocolError::HttpStatus(status)),
        }
    }
}
