//! File-backed transport for local ad tag fixtures

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use super::Transport;
use crate::error::{ProtocolError, Result};

/// Transport reading response bytes from the local filesystem
///
/// Accepts plain paths or `file://` URLs; payload and metadata are ignored.
#[derive(Debug, Clone, Default)]
pub struct FileTransport;

impl FileTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn send(
        &self,
        endpoint: &str,
        _payload: Option<Bytes>,
        _metadata: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Bytes> {
        let path = endpoint.strip_prefix("file://").unwrap_or(endpoint);

        let read = tokio::fs::read(path);
        match tokio::time::timeout(timeout, read).await {
            Ok(Ok(bytes)) => Ok(Bytes::from(bytes)),
            Ok(Err(e)) => Err(ProtocolError::Network(e)),
            Err(_) => Err(ProtocolError::Timeout),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_file_contents() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("vastkit-file-transport-{}.xml", std::process::id()));
        tokio::fs::write(&path, b"<VAST version=\"4.0\"/>")
            .await
            .expect("Operation should succeed");

        let transport = FileTransport::new();
        let body = transport
            .send(
                &format!("file://{}", path.display()),
                None,
                &HashMap::new(),
                Duration::from_secs(1),
            )
            .await
            .expect("Operation should succeed");
        assert_eq!(body, Bytes::from_static(b"<VAST version=\"4.0\"/>"));

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_network_error() {
        let transport = FileTransport::new();
        let result = transport
            .send(
                "/definitely/not/here.xml",
                None,
                &HashMap::new(),
                Duration::from_secs(1),
            )
            .await;
        assert!(matches!(result, Err(ProtocolError::Network(_))));
    }
}
