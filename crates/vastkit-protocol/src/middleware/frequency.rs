//! Frequency-cap admission middleware

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{Delivery, Middleware, Next, Rejection};
use crate::context::SessionContext;
use crate::error::{ProtocolError, Result};
use crate::request::AdRequest;
use crate::store::{FrequencyStore, frequency_key};

/// Impression cap applied per user within a fixed window
#[derive(Debug, Clone)]
pub struct FrequencyCapConfig {
    /// Maximum admitted impressions per window
    pub max_impressions: u32,
    /// Window length; fixed from the first impression, not sliding
    pub window: Duration,
    /// Scope counters per campaign instead of per user only
    pub per_campaign: bool,
}

impl Default for FrequencyCapConfig {
    fn default() -> Self {
        Self {
            max_impressions: 10,
            window: Duration::from_secs(86_400),
            per_campaign: false,
        }
    }
}

/// Claims an impression slot before letting the request through
///
/// The slot is claimed up front and is not returned if a downstream stage
/// later fails; a failed fetch still counts against the cap.
pub struct FrequencyCapMiddleware {
    config: FrequencyCapConfig,
    store: Arc<dyn FrequencyStore>,
}

impl FrequencyCapMiddleware {
    pub fn new(config: FrequencyCapConfig, store: Arc<dyn FrequencyStore>) -> Self {
        Self { config, store }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Middleware<T> for FrequencyCapMiddleware {
    async fn handle(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
        next: Next<'_, T>,
    ) -> Result<Delivery<T>> {
        let user_id = request
            .user_id()
            .ok_or(ProtocolError::MissingParameter("user_id"))?;
        let campaign_id = if self.config.per_campaign {
            Some(
                request
                    .campaign_id()
                    .ok_or(ProtocolError::MissingParameter("campaign_id"))?,
            )
        } else {
            None
        };

        let key = frequency_key(user_id, campaign_id);
        let verdict = self
            .store
            .try_increment(&key, self.config.max_impressions, self.config.window)
            .await?;

        if !verdict.admitted {
            tracing::debug!(
                "Frequency cap hit for {key}: {} of {}",
                verdict.count,
                self.config.max_impressions
            );
            return Ok(Delivery::Rejected(Rejection::FrequencyCapExceeded {
                key,
                count: verdict.count,
                limit: self.config.max_impressions,
                window: self.config.window,
            }));
        }

        next.run(request, ctx).await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::middleware::{Pipeline, Terminal};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    struct CountingTerminal(std::sync::atomic::AtomicU64);

    #[async_trait]
    impl Terminal<String> for CountingTerminal {
        async fn invoke(&self, _request: &AdRequest, _ctx: &SessionContext) -> Result<String> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok("ad".to_string())
        }
    }

    fn capped_pipeline(
        max_impressions: u32,
        terminal: Arc<CountingTerminal>,
    ) -> Pipeline<String> {
        let config = FrequencyCapConfig {
            max_impressions,
            window: Duration::from_secs(60),
            per_campaign: false,
        };
        Pipeline::new(terminal).with(Arc::new(FrequencyCapMiddleware::new(
            config,
            Arc::new(MemoryStore::new()),
        )))
    }

    #[tokio::test]
    async fn test_caps_per_user() {
        let terminal = Arc::new(CountingTerminal(std::sync::atomic::AtomicU64::new(0)));
        let pipeline = capped_pipeline(2, Arc::clone(&terminal));
        let ctx = SessionContext::new();

        let alice = AdRequest::new().param("user_id", "alice");
        let bob = AdRequest::new().param("user_id", "bob");

        for _ in 0..2 {
            let delivery = pipeline
                .fetch(&alice, &ctx)
                .await
                .expect("Operation should succeed");
            assert!(delivery.is_granted());
        }

        let delivery = pipeline
            .fetch(&alice, &ctx)
            .await
            .expect("Operation should succeed");
        match delivery.rejection() {
            Some(Rejection::FrequencyCapExceeded { key, count, limit, .. }) => {
                assert_eq!(key, "freq:user:alice");
                assert_eq!(*count, 2);
                assert_eq!(*limit, 2);
            }
            other => panic!("unexpected delivery: {other:?}"),
        }

        // Bob is unaffected by Alice's counter.
        let delivery = pipeline
            .fetch(&bob, &ctx)
            .await
            .expect("Operation should succeed");
        assert!(delivery.is_granted());
        assert_eq!(terminal.0.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_user_id_is_an_error() {
        let terminal = Arc::new(CountingTerminal(std::sync::atomic::AtomicU64::new(0)));
        let pipeline = capped_pipeline(2, terminal);

        let result = pipeline.fetch(&AdRequest::new(), &SessionContext::new()).await;
        assert!(matches!(
            result,
            Err(ProtocolError::MissingParameter("user_id"))
        ));
    }

    #[tokio::test]
    async fn test_per_campaign_scoping() {
        let store = Arc::new(MemoryStore::new());
        let config = FrequencyCapConfig {
            max_impressions: 1,
            window: Duration::from_secs(60),
            per_campaign: true,
        };
        let terminal = Arc::new(CountingTerminal(std::sync::atomic::AtomicU64::new(0)));
        let pipeline = Pipeline::new(terminal as Arc<dyn Terminal<String>>)
            .with(Arc::new(FrequencyCapMiddleware::new(config, store)));
        let ctx = SessionContext::new();

        let summer = AdRequest::new()
            .param("user_id", "alice")
            .param("campaign_id", "summer");
        let winter = AdRequest::new()
            .param("user_id", "alice")
            .param("campaign_id", "winter");

        assert!(pipeline
            .fetch(&summer, &ctx)
            .await
            .expect("Operation should succeed")
            .is_granted());
        assert!(!pipeline
            .fetch(&summer, &ctx)
            .await
            .expect("Operation should succeed")
            .is_granted());
        // A different campaign has its own counter.
        assert!(pipeline
            .fetch(&winter, &ctx)
            .await
            .expect("Operation should succeed")
            .is_granted());

        // Campaign scoping requires the campaign parameter.
        let no_campaign = AdRequest::new().param("user_id", "alice");
        let result = pipeline.fetch(&no_campaign, &ctx).await;
        assert!(matches!(
            result,
            Err(ProtocolError::MissingParameter("campaign_id"))
        ));
    }
}
