//! Fallback Chain
//!
//! Walks progressively less personalized sources until one yields candidates
//! that survive filtering:
//!
//! | Tier      | Source                         | Confidence                 |
//! |-----------|--------------------------------|----------------------------|
//! | cached    | prior ML picks, same filters   | 0.70                       |
//! | popular   | best sellers at the location   | 0.65, -0.01 per rank, ≥0.60 |
//! | signature | curated house bowls            | 0.60, -0.02 per rank, ≥0.50 |
//! | emergency | built in, no I/O               | 0.30                       |
//!
//! Each catalog tier is retried with backoff and bounded by the tier timeout.
//! The emergency tier cannot fail, so the chain always produces a result.

use super::clock::Clock;
use super::filter::{filter_and_rank, FilterCriteria};
use super::retry::{with_retry, RetryError, RetryPolicy};
use crate::error::TierError;
use crate::providers::CatalogProvider;
use bowl_common::{
    BowlComposition, DietaryRestriction, Ingredient, IngredientCategory, Nutrition,
    RecommendationCandidate, RecommendationRequest, RecommendationSource,
};
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Confidence of the emergency bowl
pub const EMERGENCY_CONFIDENCE: f32 = 0.30;

/// Catalog-backed fallback tiers, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTier {
    Cached,
    Popular,
    Signature,
}

impl CatalogTier {
    pub const ORDER: [CatalogTier; 3] = [CatalogTier::Cached, CatalogTier::Popular, CatalogTier::Signature];

    pub fn source(&self) -> RecommendationSource {
        match self {
            CatalogTier::Cached => RecommendationSource::Cached,
            CatalogTier::Popular => RecommendationSource::Popular,
            CatalogTier::Signature => RecommendationSource::Signature,
        }
    }

    /// Confidence of the bowl at position `rank` (0-based) in the tier output
    pub fn confidence_for_rank(&self, rank: usize) -> f32 {
        let rank = rank as f32;
        match self {
            CatalogTier::Cached => 0.70,
            CatalogTier::Popular => (0.65 - 0.01 * rank).max(0.60),
            CatalogTier::Signature => (0.60 - 0.02 * rank).max(0.50),
        }
    }

    fn reasoning(&self) -> &'static str {
        match self {
            CatalogTier::Cached => "Recently recommended for similar preferences",
            CatalogTier::Popular => "Popular at this location",
            CatalogTier::Signature => "House signature bowl",
        }
    }
}

/// Candidates produced by the chain and the tier that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub source: RecommendationSource,
    pub candidates: Vec<RecommendationCandidate>,
}

pub struct FallbackChain {
    catalog: Arc<dyn CatalogProvider>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    tier_timeout: Duration,
}

impl FallbackChain {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        tier_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            clock,
            retry,
            tier_timeout,
        }
    }

    /// Try each tier in order; never fails
    pub async fn run(
        &self,
        request: &RecommendationRequest,
        criteria: &FilterCriteria<'_>,
        limit: usize,
    ) -> ChainOutcome {
        for tier in CatalogTier::ORDER {
            match self.run_tier(tier, request, criteria, limit).await {
                Ok(candidates) => {
                    debug!(tier = %tier.source(), count = candidates.len(), "Fallback tier succeeded");
                    return ChainOutcome {
                        source: tier.source(),
                        candidates,
                    };
                }
                Err(err) => {
                    warn!(tier = %err.tier(), error = %err, "Fallback tier failed, advancing");
                }
            }
        }

        warn!(tier = %RecommendationSource::Emergency, "All catalog tiers failed, serving emergency bowl");
        ChainOutcome {
            source: RecommendationSource::Emergency,
            candidates: emergency_candidates(),
        }
    }

    async fn run_tier(
        &self,
        tier: CatalogTier,
        request: &RecommendationRequest,
        criteria: &FilterCriteria<'_>,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>, TierError> {
        let source = tier.source();
        let fetch = with_retry(&self.retry, self.clock.as_ref(), source.as_str(), || {
            self.fetch(tier, request)
        });

        let bowls = tokio::select! {
            biased;
            result = fetch => result.map_err(|err| retry_failure(source, err))?,
            _ = self.clock.sleep(self.tier_timeout) => {
                return Err(TierError::UpstreamTimeout {
                    tier: source,
                    timeout_ms: self.tier_timeout.as_millis() as u64,
                });
            }
        };

        if bowls.is_empty() {
            return Err(TierError::EmptyResult { tier: source });
        }

        let candidates: Vec<RecommendationCandidate> = bowls
            .into_iter()
            .enumerate()
            .map(|(rank, bowl)| {
                RecommendationCandidate::new(bowl, tier.confidence_for_rank(rank), tier.reasoning())
            })
            .collect();

        let kept = filter_and_rank(&candidates, criteria, limit);
        if kept.is_empty() {
            debug!(tier = %source, offered = candidates.len(), "Every candidate was filtered out");
            return Err(TierError::EmptyResult { tier: source });
        }
        Ok(kept)
    }

    fn fetch<'a>(
        &'a self,
        tier: CatalogTier,
        request: &'a RecommendationRequest,
    ) -> BoxFuture<'a, Result<Vec<BowlComposition>, TierError>> {
        match tier {
            CatalogTier::Cached => self.catalog.cached(request),
            CatalogTier::Popular => self.catalog.popular(request),
            CatalogTier::Signature => self.catalog.signature(request),
        }
    }
}

fn retry_failure(tier: RecommendationSource, err: RetryError<TierError>) -> TierError {
    match err {
        RetryError::TimedOut { timeout_ms, .. } => TierError::UpstreamTimeout { tier, timeout_ms },
        RetryError::Failed { error, .. } => error,
    }
}

fn plant_based(
    id: &str,
    name: &str,
    category: IngredientCategory,
    weight_g: u32,
    price_cents: u32,
    nutrition: Nutrition,
) -> Ingredient {
    Ingredient {
        id: id.to_string(),
        name: name.to_string(),
        category,
        allergens: BTreeSet::new(),
        suitable_for: DietaryRestriction::ALL.into_iter().collect(),
        weight_g,
        price_cents,
        nutrition,
    }
}

/// The bowl served when every other source fails
///
/// Contains no allergen and satisfies every dietary restriction, so it is
/// safe for any request.
pub fn emergency_bowl() -> BowlComposition {
    let nutrition = |calories, protein_g, carbs_g, fat_g| Nutrition {
        calories,
        protein_g,
        carbs_g,
        fat_g,
    };

    BowlComposition::new(
        "emergency-garden-bowl",
        "Garden Chickpea Bowl",
        plant_based("brown-rice", "Brown Rice", IngredientCategory::Base, 180, 250, nutrition(215, 5.0, 45.0, 1.8)),
    )
    .with_protein(plant_based(
        "roasted-chickpeas",
        "Roasted Chickpeas",
        IngredientCategory::Protein,
        100,
        300,
        nutrition(180, 9.0, 27.0, 4.0),
    ))
    .with_side(plant_based("mixed-greens", "Mixed Greens", IngredientCategory::Side, 60, 100, nutrition(15, 1.2, 2.5, 0.2)))
    .with_side(plant_based("cucumber", "Cucumber", IngredientCategory::Side, 50, 75, nutrition(8, 0.3, 1.8, 0.1)))
    .with_sauce(plant_based(
        "lemon-herb-dressing",
        "Lemon Herb Dressing",
        IngredientCategory::Sauce,
        30,
        50,
        nutrition(90, 0.1, 2.0, 9.0),
    ))
}

pub fn emergency_candidates() -> Vec<RecommendationCandidate> {
    vec![RecommendationCandidate::new(
        emergency_bowl(),
        EMERGENCY_CONFIDENCE,
        "Always-available bowl free of common allergens",
    )]
}
