//! Collaborators the engine depends on
//!
//! The engine never talks to a network or database directly. It calls these
//! traits, and the binary decides which implementations to wire in.

pub mod menu_catalog;

pub use menu_catalog::MenuCatalog;

use crate::error::TierError;
use async_trait::async_trait;
use bowl_common::{BowlComposition, RecommendationCandidate, RecommendationRequest, RecommendationSource};
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

/// Personalized (ML) recommendation backend
#[async_trait]
pub trait PersonalizationProvider: Send + Sync {
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<RecommendationCandidate>, TierError>;
}

/// Non-personalized bowl sources used by the fallback tiers
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Bowls previously recommended by the ML service for the same filters
    async fn cached(&self, request: &RecommendationRequest) -> Result<Vec<BowlComposition>, TierError>;

    /// Best sellers at the location, most popular first
    async fn popular(&self, request: &RecommendationRequest) -> Result<Vec<BowlComposition>, TierError>;

    /// Curated house bowls
    async fn signature(&self, request: &RecommendationRequest) -> Result<Vec<BowlComposition>, TierError>;

    /// Called after a personalized result is served
    fn record_success(&self, _request: &RecommendationRequest, _candidates: &[RecommendationCandidate]) {}
}

/// Per-user taste signals used for the preference boost
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSignals {
    pub preferred_ingredient_ids: BTreeSet<String>,
}

impl PreferenceSignals {
    pub fn new<I, S>(ingredient_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preferred_ingredient_ids: ingredient_ids.into_iter().map(Into::into).collect(),
        }
    }
}

pub trait PreferenceStore: Send + Sync {
    fn signals(&self, user_id: &str) -> Option<PreferenceSignals>;
}

/// Preference store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    users: RwLock<HashMap<String, PreferenceSignals>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: impl Into<String>, signals: PreferenceSignals) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), signals);
    }
}

impl PreferenceStore for InMemoryPreferences {
    fn signals(&self, user_id: &str) -> Option<PreferenceSignals> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}

/// Personalization backend for deployments without an ML service
///
/// Every call fails immediately, so requests go straight to the fallback tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePersonalization;

#[async_trait]
impl PersonalizationProvider for UnavailablePersonalization {
    async fn recommend(
        &self,
        _request: &RecommendationRequest,
    ) -> Result<Vec<RecommendationCandidate>, TierError> {
        Err(TierError::UpstreamFailure {
            tier: RecommendationSource::Ml,
            message: "no personalization backend configured".to_string(),
        })
    }
}
