//! Wrapper chain resolution
//!
//! Follows `<Wrapper>` redirects until an `<InLine>` ad is reached, with a
//! depth cap, a per-hop timeout, and an overall deadline. Chain failures are
//! carried inside the returned [`VastResolutionResult`] rather than thrown,
//! so callers always get the visited chain and the tracking URLs gathered
//! before things went wrong.

use std::time::{Duration, Instant};

use serde_json::Value;
use std::collections::BTreeMap;

use super::macros::error_code_for;
use super::model::{VastAd, VastDocument};
use super::selection::SelectionStrategy;
use crate::context::SessionContext;
use crate::error::{ProtocolError, Result};
use crate::request::AdRequest;
use crate::upstream::Upstream;
use crate::vast::model::MediaFile;

/// Tuning for wrapper chain resolution
#[derive(Debug, Clone)]
pub struct VastChainConfig {
    /// Maximum wrapper redirects before giving up
    pub max_depth: u32,
    /// Overall deadline for one resolution attempt, fallbacks each get
    /// their own
    pub timeout: Duration,
    /// Timeout for each individual hop
    pub per_request_timeout: Duration,
    /// Try fallback upstreams when the primary chain fails
    pub enable_fallbacks: bool,
    /// How to pick a creative from the terminal inline ad
    pub selection_strategy: SelectionStrategy,
    /// Gather impression and tracking-event URLs from every level
    pub collect_tracking_urls: bool,
    /// Gather error pixel URLs from every level
    pub collect_error_urls: bool,
    /// Parameters added to every request, the request's own win on conflict
    pub additional_params: BTreeMap<String, Value>,
}

impl Default for VastChainConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            timeout: Duration::from_secs(10),
            per_request_timeout: Duration::from_secs(4),
            enable_fallbacks: true,
            selection_strategy: SelectionStrategy::default(),
            collect_tracking_urls: true,
            collect_error_urls: true,
            additional_params: BTreeMap::new(),
        }
    }
}

/// Outcome of one resolution, success or not
#[derive(Debug)]
pub struct VastResolutionResult {
    /// Whether an inline ad was reached
    pub success: bool,
    /// The terminal inline document on success
    pub vast: Option<VastDocument>,
    /// Creative picked by the configured strategy, when the inline ad had
    /// any media files
    pub selected_creative: Option<MediaFile>,
    /// Every endpoint visited, in order
    pub chain: Vec<String>,
    /// Impression and tracking-event URLs gathered across all levels
    pub tracking_urls: Vec<String>,
    /// Error pixel URLs gathered across all levels
    pub error_urls: Vec<String>,
    /// The failure that stopped the primary chain
    pub error: Option<ProtocolError>,
    /// Whether a fallback upstream produced the result
    pub used_fallback: bool,
    pub resolution_time_ms: u64,
}

impl VastResolutionResult {
    /// IAB error code for the carried failure, when there is one
    pub fn error_code(&self) -> Option<u32> {
        self.error.as_ref().map(error_code_for)
    }
}

/// Resolves wrapper chains against a primary upstream with optional
/// fallbacks
pub struct VastResolver {
    primary: Upstream<VastDocument>,
    fallbacks: Vec<Upstream<VastDocument>>,
    config: VastChainConfig,
}

impl VastResolver {
    pub fn new(primary: Upstream<VastDocument>, config: VastChainConfig) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_fallbacks(mut self, fallbacks: Vec<Upstream<VastDocument>>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn primary(&self) -> &Upstream<VastDocument> {
        &self.primary
    }

    pub fn config(&self) -> &VastChainConfig {
        &self.config
    }

    /// Resolve from scratch, fetching the primary response itself
    pub async fn resolve(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
    ) -> VastResolutionResult {
        self.run(None, request, ctx).await
    }

    /// Continue from an already-fetched primary response
    ///
    /// Used when the first fetch went through the admission pipeline;
    /// fallbacks still start from their own endpoints when the chain fails.
    pub async fn resolve_seeded(
        &self,
        first: VastDocument,
        request: &AdRequest,
        ctx: &SessionContext,
    ) -> VastResolutionResult {
        self.run(Some(first), request, ctx).await
    }

    async fn run(
        &self,
        seed: Option<VastDocument>,
        request: &AdRequest,
        ctx: &SessionContext,
    ) -> VastResolutionResult {
        let started = Instant::now();
        let request = self.merged_request(request);

        let mut primary_chain = Vec::new();
        let mut primary_levels = Vec::new();
        let attempt = tokio::time::timeout(
            self.config.timeout,
            self.follow(&self.primary, seed, &request, ctx, &mut primary_chain, &mut primary_levels),
        )
        .await;

        let primary_error = match attempt {
            Ok(Ok(())) => return self.finish(primary_levels, primary_chain, false, started),
            Ok(Err(e)) => e,
            Err(_) => ProtocolError::Timeout,
        };
        tracing::warn!(
            "Primary chain failed after {} hop(s): {primary_error}",
            primary_chain.len()
        );

        if self.config.enable_fallbacks {
            for fallback in &self.fallbacks {
                let mut chain = Vec::new();
                let mut levels = Vec::new();
                let attempt = tokio::time::timeout(
                    self.config.timeout,
                    self.follow(fallback, None, &request, ctx, &mut chain, &mut levels),
                )
                .await;
                match attempt {
                    Ok(Ok(())) => return self.finish(levels, chain, true, started),
                    Ok(Err(e)) => {
                        tracing::warn!("Fallback {} failed: {e}", fallback.endpoint());
                    }
                    Err(_) => {
                        tracing::warn!("Fallback {} timed out", fallback.endpoint());
                    }
                }
            }
        }

        if self.config.enable_fallbacks && !self.fallbacks.is_empty() {
            tracing::error!(
                "All upstreams failed, primary and {} fallback(s)",
                self.fallbacks.len()
            );
        }

        // Failures report the primary attempt: its error, its chain, and
        // whatever pixels were gathered before it stopped.
        let (tracking_urls, error_urls) = self.collect_urls(&primary_levels);
        VastResolutionResult {
            success: false,
            vast: None,
            selected_creative: None,
            chain: primary_chain,
            tracking_urls,
            error_urls,
            error: Some(primary_error),
            used_fallback: false,
            resolution_time_ms: elapsed_ms(started),
        }
    }

    async fn follow(
        &self,
        origin: &Upstream<VastDocument>,
        seed: Option<VastDocument>,
        request: &AdRequest,
        ctx: &SessionContext,
        chain: &mut Vec<String>,
        levels: &mut Vec<VastDocument>,
    ) -> Result<()> {
        let mut upstream = origin.clone();
        let mut pending = seed;
        let mut depth = 0u32;

        loop {
            chain.push(upstream.endpoint().to_string());
            let doc = match pending.take() {
                Some(doc) => doc,
                None => {
                    upstream
                        .fetch(request, ctx, Some(self.config.per_request_timeout))
                        .await?
                }
            };

            match &doc.ad {
                None => {
                    return Err(ProtocolError::Parse(
                        "VAST response contains neither InLine nor Wrapper".to_string(),
                    ));
                }
                Some(VastAd::Inline(_)) => {
                    levels.push(doc);
                    return Ok(());
                }
                Some(VastAd::Wrapper(wrapper)) => {
                    let uri = wrapper.ad_tag_uri.clone();
                    levels.push(doc);
                    let uri = uri.ok_or(ProtocolError::MissingAdTagUri)?;
                    depth += 1;
                    if depth >= self.config.max_depth {
                        return Err(ProtocolError::DepthExceeded { depth });
                    }
                    tracing::debug!("Following wrapper redirect {depth} to {uri}");
                    upstream = upstream.rebind(uri);
                }
            }
        }
    }

    fn finish(
        &self,
        mut levels: Vec<VastDocument>,
        chain: Vec<String>,
        used_fallback: bool,
        started: Instant,
    ) -> VastResolutionResult {
        let (tracking_urls, error_urls) = self.collect_urls(&levels);
        let vast = levels.pop();
        let selected_creative = vast.as_ref().and_then(|doc| match &doc.ad {
            Some(VastAd::Inline(inline)) => {
                self.config.selection_strategy.select(&inline.media_files).cloned()
            }
            _ => None,
        });

        VastResolutionResult {
            success: true,
            vast,
            selected_creative,
            chain,
            tracking_urls,
            error_urls,
            error: None,
            used_fallback,
            resolution_time_ms: elapsed_ms(started),
        }
    }

    fn collect_urls(&self, levels: &[VastDocument]) -> (Vec<String>, Vec<String>) {
        let mut tracking_urls = Vec::new();
        let mut error_urls = Vec::new();
        for doc in levels {
            if self.config.collect_tracking_urls {
                tracking_urls.extend_from_slice(doc.impressions());
                tracking_urls.extend_from_slice(doc.tracking_events());
            }
            if self.config.collect_error_urls {
                error_urls.extend_from_slice(doc.error_urls());
            }
        }
        (tracking_urls, error_urls)
    }

    pub(crate) fn merged_request(&self, request: &AdRequest) -> AdRequest {
        if self.config.additional_params.is_empty() {
            return request.clone();
        }
        let mut merged = AdRequest::new();
        for (name, value) in &self.config.additional_params {
            merged.set(name.clone(), value.clone());
        }
        for (name, value) in request.params() {
            merged.set(name.clone(), value.clone());
        }
        merged
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
