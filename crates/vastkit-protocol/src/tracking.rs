//! Fire-and-forget tracking pixel dispatch
//!
//! Tracking never influences delivery: a dead pixel endpoint logs a warning
//! and nothing else. A semaphore bounds how many pixels are in flight at
//! once so a burst of impressions cannot exhaust connections, and each fire
//! gets its own short timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::context::SessionContext;
use crate::transport::Transport;
use crate::vast::macros::substitute;

/// Bounded dispatcher for tracking and error pixels
pub struct TrackingDispatcher {
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
    fire_timeout: Duration,
}

impl TrackingDispatcher {
    pub fn new(transport: Arc<dyn Transport>, concurrency: usize, fire_timeout: Duration) -> Self {
        Self {
            transport,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            fire_timeout,
        }
    }

    /// Fire error pixels with `[ERRORCODE]` substituted
    pub async fn track_error(&self, code: u32, urls: &[String], ctx: &SessionContext) {
        self.fire_all(Some(code), urls, ctx).await;
    }

    /// Fire impression pixels
    pub async fn track_impressions(&self, urls: &[String], ctx: &SessionContext) {
        self.fire_all(None, urls, ctx).await;
    }

    /// Fire pixels recording that a fallback upstream served the request
    pub async fn track_fallback(&self, urls: &[String], ctx: &SessionContext) {
        self.fire_all(None, urls, ctx).await;
    }

    /// Fire in a detached task; returns immediately
    ///
    /// The task holds its own reference to the dispatcher, so shutdown does
    /// not cancel pixels already dispatched.
    pub fn dispatch_detached(
        self: &Arc<Self>,
        code: Option<u32>,
        urls: Vec<String>,
        ctx: SessionContext,
    ) {
        if urls.is_empty() {
            return;
        }
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.fire_all(code, &urls, &ctx).await;
        });
    }

    async fn fire_all(&self, code: Option<u32>, urls: &[String], ctx: &SessionContext) {
        let fires = urls.iter().map(|url| self.fire(substitute(url, code, ctx)));
        futures::future::join_all(fires).await;
    }

    async fn fire(&self, url: String) {
        // Closed semaphore only happens at teardown; drop the pixel.
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };
        match self
            .transport
            .send(&url, None, &HashMap::new(), self.fire_timeout)
            .await
        {
            Ok(_) => tracing::debug!("Fired tracking pixel: {url}"),
            Err(e) => tracing::warn!("Tracking pixel failed for {url}: {e}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transport::{CannedFailure, MemoryTransport};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fires_every_url_with_macros_substituted() {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond("https://ads.test/e?code=301", &b""[..]);
        transport.respond("https://ads.test/e2", &b""[..]);

        let dispatcher = TrackingDispatcher::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            4,
            Duration::from_secs(1),
        );
        let urls = vec![
            "https://ads.test/e?code=[ERRORCODE]".to_string(),
            "https://ads.test/e2".to_string(),
        ];
        dispatcher.track_error(301, &urls, &SessionContext::new()).await;

        let endpoints: Vec<String> = transport
            .sends()
            .into_iter()
            .map(|send| send.endpoint)
            .collect();
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.contains(&"https://ads.test/e?code=301".to_string()));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail("https://ads.test/dead", CannedFailure::Timeout);
        transport.respond("https://ads.test/alive", &b""[..]);

        let dispatcher = TrackingDispatcher::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            4,
            Duration::from_secs(1),
        );
        let urls = vec![
            "https://ads.test/dead".to_string(),
            "https://ads.test/alive".to_string(),
        ];
        // Must not panic or error out.
        dispatcher.track_impressions(&urls, &SessionContext::new()).await;
        assert_eq!(transport.send_count(), 2);
    }

    #[tokio::test]
    async fn test_detached_dispatch_completes() {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond("https://ads.test/i", &b""[..]);

        let dispatcher = Arc::new(TrackingDispatcher::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            2,
            Duration::from_secs(1),
        ));
        dispatcher.dispatch_detached(
            None,
            vec!["https://ads.test/i".to_string()],
            SessionContext::new(),
        );

        // Detached fires land shortly after spawn.
        for _ in 0..50 {
            if transport.send_count() == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("detached tracking pixel never fired");
    }
}
