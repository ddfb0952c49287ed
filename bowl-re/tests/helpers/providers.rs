//! Fake collaborators with call counters

use async_trait::async_trait;
use bowl_common::{BowlComposition, RecommendationCandidate, RecommendationRequest, RecommendationSource};
use bowl_re::providers::{CatalogProvider, PersonalizationProvider};
use bowl_re::TierError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    Return(Vec<RecommendationCandidate>),
    Fail,
    Panic,
}

/// Personalization stub: fixed answer after an optional delay
pub struct FakePersonalization {
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakePersonalization {
    pub fn returning(candidates: Vec<RecommendationCandidate>) -> Self {
        Self::new(Behavior::Return(candidates))
    }

    pub fn failing() -> Self {
        Self::new(Behavior::Fail)
    }

    pub fn panicking() -> Self {
        Self::new(Behavior::Panic)
    }

    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersonalizationProvider for FakePersonalization {
    async fn recommend(
        &self,
        _request: &RecommendationRequest,
    ) -> Result<Vec<RecommendationCandidate>, TierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Return(candidates) => Ok(candidates.clone()),
            Behavior::Fail => Err(TierError::UpstreamFailure {
                tier: RecommendationSource::Ml,
                message: "model server unreachable".to_string(),
            }),
            Behavior::Panic => panic!("personalization crashed"),
        }
    }
}

/// Catalog stub: each tier returns its list, or fails when unset
#[derive(Default)]
pub struct FakeCatalog {
    pub cached: Option<Vec<BowlComposition>>,
    pub popular: Option<Vec<BowlComposition>>,
    pub signature: Option<Vec<BowlComposition>>,
    /// Tiers that never answer
    pub hanging: Vec<RecommendationSource>,
    /// Tiers that panic when called
    pub panicking: Vec<RecommendationSource>,
    pub calls: AtomicUsize,
    pub recorded: Mutex<Vec<Vec<String>>>,
}

impl FakeCatalog {
    /// Every tier fails
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_popular(bowls: Vec<BowlComposition>) -> Self {
        Self {
            popular: Some(bowls),
            ..Self::default()
        }
    }

    /// Make `tier` hang forever instead of answering
    pub fn hanging(mut self, tier: RecommendationSource) -> Self {
        self.hanging.push(tier);
        self
    }

    /// Make `tier` panic when called
    pub fn panicking(mut self, tier: RecommendationSource) -> Self {
        self.panicking.push(tier);
        self
    }

    /// Total tier calls, retries included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bowl ids passed to `record_success`, one entry per call
    pub fn recorded(&self) -> Vec<Vec<String>> {
        self.recorded.lock().unwrap().clone()
    }

    async fn respond(
        &self,
        tier: RecommendationSource,
        bowls: &Option<Vec<BowlComposition>>,
    ) -> Result<Vec<BowlComposition>, TierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.contains(&tier) {
            std::future::pending::<()>().await;
        }
        if self.panicking.contains(&tier) {
            panic!("catalog {} crashed", tier);
        }
        bowls.clone().ok_or(TierError::UpstreamFailure {
            tier,
            message: "catalog outage".to_string(),
        })
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn cached(&self, _request: &RecommendationRequest) -> Result<Vec<BowlComposition>, TierError> {
        self.respond(RecommendationSource::Cached, &self.cached).await
    }

    async fn popular(&self, _request: &RecommendationRequest) -> Result<Vec<BowlComposition>, TierError> {
        self.respond(RecommendationSource::Popular, &self.popular).await
    }

    async fn signature(&self, _request: &RecommendationRequest) -> Result<Vec<BowlComposition>, TierError> {
        self.respond(RecommendationSource::Signature, &self.signature).await
    }

    fn record_success(&self, _request: &RecommendationRequest, candidates: &[RecommendationCandidate]) {
        let ids = candidates.iter().map(|c| c.bowl.id.clone()).collect();
        self.recorded.lock().unwrap().push(ids);
    }
}
