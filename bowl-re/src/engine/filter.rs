//! Filter/Rank Engine
//!
//! Pure candidate filtering applied to the output of every tier:
//! 1. Allergen exclusion (any ingredient flagged with a requested allergen)
//! 2. Dietary exclusion (any ingredient unsuitable for an active restriction)
//! 3. Availability exclusion (ingredient not stocked at the location)
//! 4. Preference boost (additive per matching ingredient, capped at 1.0)
//! 5. Sort by confidence descending, truncate to limit
//!
//! The input slice is never modified. A non-empty input that is entirely
//! excluded yields an empty list, which callers treat as tier failure.

use crate::providers::PreferenceSignals;
use bowl_common::{Allergen, DietaryRestriction, RecommendationCandidate, RecommendationRequest};
use std::collections::BTreeSet;

/// Everything the filter needs to judge a candidate
#[derive(Debug, Clone, Copy)]
pub struct FilterCriteria<'a> {
    pub dietary_restrictions: &'a BTreeSet<DietaryRestriction>,
    pub allergens: &'a BTreeSet<Allergen>,
    /// `None` disables the availability check
    pub available_ingredient_ids: Option<&'a BTreeSet<String>>,
    pub preferences: Option<&'a PreferenceSignals>,
    /// Confidence added per preferred ingredient
    pub preference_boost: f32,
}

impl<'a> FilterCriteria<'a> {
    pub fn for_request(
        request: &'a RecommendationRequest,
        preferences: Option<&'a PreferenceSignals>,
        preference_boost: f32,
    ) -> Self {
        let available = request.available_ingredient_ids();
        Self {
            dietary_restrictions: request.dietary_restrictions(),
            allergens: request.allergens(),
            available_ingredient_ids: (!available.is_empty()).then_some(available),
            preferences,
            preference_boost,
        }
    }
}

/// Why a candidate was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Allergen { ingredient: String, allergen: Allergen },
    Dietary { ingredient: String, restriction: DietaryRestriction },
    Unavailable { ingredient: String },
}

/// First rule the candidate breaks, if any
pub fn exclusion_reason(
    candidate: &RecommendationCandidate,
    criteria: &FilterCriteria<'_>,
) -> Option<Exclusion> {
    for ingredient in candidate.bowl.ingredients() {
        if let Some(allergen) = ingredient.allergens.intersection(criteria.allergens).next() {
            return Some(Exclusion::Allergen {
                ingredient: ingredient.id.clone(),
                allergen: *allergen,
            });
        }

        if let Some(restriction) = criteria
            .dietary_restrictions
            .iter()
            .find(|r| !ingredient.is_suitable_for(**r))
        {
            return Some(Exclusion::Dietary {
                ingredient: ingredient.id.clone(),
                restriction: *restriction,
            });
        }

        if let Some(available) = criteria.available_ingredient_ids {
            if !available.contains(&ingredient.id) {
                return Some(Exclusion::Unavailable {
                    ingredient: ingredient.id.clone(),
                });
            }
        }
    }
    None
}

/// Filter, boost, rank and truncate candidates
pub fn filter_and_rank(
    candidates: &[RecommendationCandidate],
    criteria: &FilterCriteria<'_>,
    limit: usize,
) -> Vec<RecommendationCandidate> {
    let mut kept: Vec<RecommendationCandidate> = candidates
        .iter()
        .filter(|candidate| match exclusion_reason(candidate, criteria) {
            Some(reason) => {
                tracing::trace!(bowl = %candidate.bowl.id, ?reason, "Candidate excluded");
                false
            }
            None => true,
        })
        .map(|candidate| apply_preferences(candidate, criteria))
        .collect();

    // Stable: equal confidences keep tier order
    kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    kept.truncate(limit);
    kept
}

fn apply_preferences(
    candidate: &RecommendationCandidate,
    criteria: &FilterCriteria<'_>,
) -> RecommendationCandidate {
    let Some(preferences) = criteria.preferences else {
        return candidate.clone();
    };

    let matches = candidate
        .bowl
        .ingredients()
        .filter(|i| preferences.preferred_ingredient_ids.contains(&i.id))
        .count();
    if matches == 0 || criteria.preference_boost <= 0.0 {
        return candidate.clone();
    }

    let boosted = candidate.confidence + criteria.preference_boost * matches as f32;
    RecommendationCandidate::new(
        candidate.bowl.clone(),
        boosted.min(1.0),
        format!("{}; matches {} of your favourite ingredients", candidate.reasoning, matches),
    )
}
