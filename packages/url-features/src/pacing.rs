//! Pauses between outbound requests.
//!
//! Every pause point in the pipeline goes through a [`Pacer`], so tests can
//! run without sleeping and deployments can swap jitter for a token bucket.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use rand::Rng;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::types::config::{PacingConfig, PauseRange};

/// Where in the pipeline a pause happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseKind {
    /// After a URL that is not the last of its chunk
    BetweenUrls,
    /// After a chunk that is not the last
    BetweenBatches,
    /// Between fetch attempts
    FetchRetry,
    /// Before a search-index query
    SearchProbe,
}

/// Source of pauses.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, kind: PauseKind);
}

#[async_trait]
impl<P: Pacer + ?Sized> Pacer for Arc<P> {
    async fn pause(&self, kind: PauseKind) {
        (**self).pause(kind).await
    }
}

/// Sleeps for a uniformly random duration drawn from the configured range.
#[derive(Debug, Clone, Default)]
pub struct JitteredPacer {
    config: PacingConfig,
}

impl JitteredPacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    fn range(&self, kind: PauseKind) -> PauseRange {
        match kind {
            PauseKind::BetweenUrls => self.config.between_urls,
            PauseKind::BetweenBatches => self.config.between_batches,
            PauseKind::FetchRetry => self.config.fetch_retry,
            PauseKind::SearchProbe => self.config.search_probe,
        }
    }

    /// Draw a pause duration for `kind`.
    pub fn draw(&self, kind: PauseKind) -> Duration {
        let range = self.range(kind);
        let min = range.min_secs.max(0.0);
        let max = range.max_secs.max(min);
        if max <= min {
            return Duration::from_secs_f64(min);
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(min..=max))
    }
}

#[async_trait]
impl Pacer for JitteredPacer {
    async fn pause(&self, kind: PauseKind) {
        let duration = self.draw(kind);
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Never pauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacer;

#[async_trait]
impl Pacer for NoPacer {
    async fn pause(&self, _kind: PauseKind) {}
}

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A pacer wrapper that additionally enforces a request rate.
///
/// Waits for the inner pacer first, then for a permit from a token bucket.
pub struct RateLimitedPacer<P: Pacer> {
    inner: P,
    limiter: Arc<DefaultRateLimiter>,
}

impl<P: Pacer> RateLimitedPacer<P> {
    /// Wrap `pacer`; a zero rate is raised to one per second.
    pub fn new(pacer: P, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32)));
        Self::with_quota(pacer, quota)
    }

    pub fn with_quota(pacer: P, quota: Quota) -> Self {
        Self {
            inner: pacer,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn with_burst(pacer: P, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32)))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(nonzero!(1u32)));
        Self::with_quota(pacer, quota)
    }
}

#[async_trait]
impl<P: Pacer> Pacer for RateLimitedPacer<P> {
    async fn pause(&self, kind: PauseKind) {
        self.inner.pause(kind).await;
        self.limiter.until_ready().await;
    }
}

/// Extension trait for easy rate limiting.
pub trait PacerExt: Pacer + Sized {
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedPacer<Self> {
        RateLimitedPacer::new(self, requests_per_second)
    }
}

impl<P: Pacer + Sized> PacerExt for P {}

/// The pacer a deployment runs with: jitter from `config`, behind a token
/// bucket when `requests_per_second` is set.
pub fn pacer_for(config: &PacingConfig) -> Arc<dyn Pacer> {
    let jittered = JitteredPacer::new(config.clone());
    match config.requests_per_second {
        Some(rps) => Arc::new(jittered.rate_limited(rps)),
        None => Arc::new(jittered),
    }
}
