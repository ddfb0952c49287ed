//! Domain model for bowl recommendations
//!
//! Types shared by the recommendation engine and its HTTP surface:
//! - Closed enumerations for dietary restrictions, allergens and result provenance
//! - Ingredients and bowl compositions (read-only to the engine)
//! - Recommendation requests (validated on construction) and results

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of recommendations returned when the caller does not ask for a limit
pub const DEFAULT_LIMIT: usize = 5;

/// Largest limit a request may ask for
pub const MAX_LIMIT: usize = 20;

// ========================================
// Validation
// ========================================

/// Malformed recommendation request
///
/// The only error a caller of the engine can observe. Raised while the
/// request is built, before any data source is contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("location_id must not be empty")]
    EmptyLocation,

    #[error("user_id must not be blank when present")]
    BlankUserId,

    #[error("limit {limit} out of range [1, {max}]")]
    InvalidLimit { limit: usize, max: usize },

    #[error("unknown dietary restriction: {0}")]
    UnknownDietaryRestriction(String),

    #[error("unknown allergen: {0}")]
    UnknownAllergen(String),
}

// ========================================
// Enumerations
// ========================================

/// Dietary restriction a user can ask the engine to honour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryRestriction {
    Vegetarian,
    Vegan,
    Pescatarian,
    GlutenFree,
    DairyFree,
}

impl DietaryRestriction {
    pub const ALL: [DietaryRestriction; 5] = [
        DietaryRestriction::Vegetarian,
        DietaryRestriction::Vegan,
        DietaryRestriction::Pescatarian,
        DietaryRestriction::GlutenFree,
        DietaryRestriction::DairyFree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DietaryRestriction::Vegetarian => "vegetarian",
            DietaryRestriction::Vegan => "vegan",
            DietaryRestriction::Pescatarian => "pescatarian",
            DietaryRestriction::GlutenFree => "gluten_free",
            DietaryRestriction::DairyFree => "dairy_free",
        }
    }
}

impl fmt::Display for DietaryRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DietaryRestriction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownDietaryRestriction(s.to_string()))
    }
}

/// Allergen flag carried by ingredients
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allergen {
    Dairy,
    Eggs,
    Fish,
    Shellfish,
    TreeNuts,
    Peanuts,
    Wheat,
    Soy,
    Sesame,
}

impl Allergen {
    pub const ALL: [Allergen; 9] = [
        Allergen::Dairy,
        Allergen::Eggs,
        Allergen::Fish,
        Allergen::Shellfish,
        Allergen::TreeNuts,
        Allergen::Peanuts,
        Allergen::Wheat,
        Allergen::Soy,
        Allergen::Sesame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Allergen::Dairy => "dairy",
            Allergen::Eggs => "eggs",
            Allergen::Fish => "fish",
            Allergen::Shellfish => "shellfish",
            Allergen::TreeNuts => "tree_nuts",
            Allergen::Peanuts => "peanuts",
            Allergen::Wheat => "wheat",
            Allergen::Soy => "soy",
            Allergen::Sesame => "sesame",
        }
    }
}

impl fmt::Display for Allergen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Allergen {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownAllergen(s.to_string()))
    }
}

/// Provenance of a recommendation result
///
/// Lets the UI pick its messaging ("personalized for you" vs "popular picks")
/// without knowing why a fallback happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Ml,
    Cached,
    Popular,
    Signature,
    Emergency,
}

impl RecommendationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationSource::Ml => "ml",
            RecommendationSource::Cached => "cached",
            RecommendationSource::Popular => "popular",
            RecommendationSource::Signature => "signature",
            RecommendationSource::Emergency => "emergency",
        }
    }

    /// True for every source except the personalization service
    pub fn is_fallback(&self) -> bool {
        !matches!(self, RecommendationSource::Ml)
    }
}

impl fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// Ingredients and Bowls
// ========================================

/// Slot an ingredient occupies in a bowl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientCategory {
    Base,
    Protein,
    Side,
    Sauce,
    Garnish,
}

/// Nutrition totals (per ingredient portion or per bowl)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: u32,
    pub protein_g: f32,
    pub carbs_g: f32,
    pub fat_g: f32,
}

impl std::ops::Add for Nutrition {
    type Output = Nutrition;

    fn add(self, other: Nutrition) -> Nutrition {
        Nutrition {
            calories: self.calories + other.calories,
            protein_g: self.protein_g + other.protein_g,
            carbs_g: self.carbs_g + other.carbs_g,
            fat_g: self.fat_g + other.fat_g,
        }
    }
}

/// A single ingredient portion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub category: IngredientCategory,
    /// Allergens present in this ingredient
    #[serde(default)]
    pub allergens: BTreeSet<Allergen>,
    /// Dietary restrictions this ingredient is compatible with
    #[serde(default)]
    pub suitable_for: BTreeSet<DietaryRestriction>,
    pub weight_g: u32,
    pub price_cents: u32,
    #[serde(default)]
    pub nutrition: Nutrition,
}

impl Ingredient {
    /// True if any of this ingredient's allergens appears in `allergens`
    pub fn has_any_allergen(&self, allergens: &BTreeSet<Allergen>) -> bool {
        !self.allergens.is_disjoint(allergens)
    }

    pub fn is_suitable_for(&self, restriction: DietaryRestriction) -> bool {
        self.suitable_for.contains(&restriction)
    }
}

/// A complete bowl: base, optional protein, sides, optional sauce, garnishes
///
/// Totals are derived whenever a part is added, so a composition is always
/// internally consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BowlComposition {
    pub id: String,
    pub name: String,
    pub base: Ingredient,
    pub protein: Option<Ingredient>,
    pub sides: Vec<Ingredient>,
    pub sauce: Option<Ingredient>,
    pub garnishes: Vec<Ingredient>,
    pub total_weight_g: u32,
    pub total_price_cents: u32,
    pub nutrition: Nutrition,
}

impl BowlComposition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base: Ingredient) -> Self {
        let mut bowl = Self {
            id: id.into(),
            name: name.into(),
            base,
            protein: None,
            sides: Vec::new(),
            sauce: None,
            garnishes: Vec::new(),
            total_weight_g: 0,
            total_price_cents: 0,
            nutrition: Nutrition::default(),
        };
        bowl.recompute_totals();
        bowl
    }

    pub fn with_protein(mut self, protein: Ingredient) -> Self {
        self.protein = Some(protein);
        self.recompute_totals();
        self
    }

    pub fn with_side(mut self, side: Ingredient) -> Self {
        self.sides.push(side);
        self.recompute_totals();
        self
    }

    pub fn with_sauce(mut self, sauce: Ingredient) -> Self {
        self.sauce = Some(sauce);
        self.recompute_totals();
        self
    }

    pub fn with_garnish(mut self, garnish: Ingredient) -> Self {
        self.garnishes.push(garnish);
        self.recompute_totals();
        self
    }

    /// Every ingredient in the bowl, base first
    pub fn ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        std::iter::once(&self.base)
            .chain(self.protein.iter())
            .chain(self.sides.iter())
            .chain(self.sauce.iter())
            .chain(self.garnishes.iter())
    }

    fn recompute_totals(&mut self) {
        let (weight, price, nutrition) = self.ingredients().fold(
            (0u32, 0u32, Nutrition::default()),
            |(w, p, n), i| (w + i.weight_g, p + i.price_cents, n + i.nutrition),
        );
        self.total_weight_g = weight;
        self.total_price_cents = price;
        self.nutrition = nutrition;
    }
}

// ========================================
// Requests
// ========================================

/// Recommendation request
///
/// Immutable once built. The only way to obtain one is
/// [`RecommendationRequest::builder`], which validates every field, so the
/// engine never sees a malformed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationRequest {
    user_id: Option<String>,
    dietary_restrictions: BTreeSet<DietaryRestriction>,
    allergens: BTreeSet<Allergen>,
    location_id: String,
    available_ingredient_ids: BTreeSet<String>,
    limit: usize,
}

impl RecommendationRequest {
    pub fn builder(location_id: impl Into<String>) -> RecommendationRequestBuilder {
        RecommendationRequestBuilder {
            user_id: None,
            dietary_restrictions: BTreeSet::new(),
            allergens: BTreeSet::new(),
            location_id: location_id.into(),
            available_ingredient_ids: BTreeSet::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn dietary_restrictions(&self) -> &BTreeSet<DietaryRestriction> {
        &self.dietary_restrictions
    }

    pub fn allergens(&self) -> &BTreeSet<Allergen> {
        &self.allergens
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    /// Ingredient ids in stock at the location (empty = no availability data)
    pub fn available_ingredient_ids(&self) -> &BTreeSet<String> {
        &self.available_ingredient_ids
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Builder for [`RecommendationRequest`]
#[derive(Debug, Clone)]
pub struct RecommendationRequestBuilder {
    user_id: Option<String>,
    dietary_restrictions: BTreeSet<DietaryRestriction>,
    allergens: BTreeSet<Allergen>,
    location_id: String,
    available_ingredient_ids: BTreeSet<String>,
    limit: usize,
}

impl RecommendationRequestBuilder {
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn dietary_restriction(mut self, restriction: DietaryRestriction) -> Self {
        self.dietary_restrictions.insert(restriction);
        self
    }

    pub fn dietary_restrictions(
        mut self,
        restrictions: impl IntoIterator<Item = DietaryRestriction>,
    ) -> Self {
        self.dietary_restrictions.extend(restrictions);
        self
    }

    pub fn allergen(mut self, allergen: Allergen) -> Self {
        self.allergens.insert(allergen);
        self
    }

    pub fn allergens(mut self, allergens: impl IntoIterator<Item = Allergen>) -> Self {
        self.allergens.extend(allergens);
        self
    }

    pub fn available_ingredients<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_ingredient_ids
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Validate and freeze the request
    pub fn build(self) -> Result<RecommendationRequest, ValidationError> {
        let location_id = self.location_id.trim().to_string();
        if location_id.is_empty() {
            return Err(ValidationError::EmptyLocation);
        }

        let user_id = match self.user_id {
            Some(id) if id.trim().is_empty() => return Err(ValidationError::BlankUserId),
            Some(id) => Some(id.trim().to_string()),
            None => None,
        };

        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(ValidationError::InvalidLimit {
                limit: self.limit,
                max: MAX_LIMIT,
            });
        }

        Ok(RecommendationRequest {
            user_id,
            dietary_restrictions: self.dietary_restrictions,
            allergens: self.allergens,
            location_id,
            available_ingredient_ids: self.available_ingredient_ids,
            limit: self.limit,
        })
    }
}

// ========================================
// Candidates and Results
// ========================================

/// A bowl with the confidence a tier places in it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationCandidate {
    pub bowl: BowlComposition,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    pub reasoning: String,
}

impl RecommendationCandidate {
    /// Create new candidate with clamped confidence (0.0-1.0)
    pub fn new(bowl: BowlComposition, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            bowl,
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }
}

/// Ranked recommendations with honest provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub recommendations: Vec<RecommendationCandidate>,
    pub source: RecommendationSource,
    /// Mean confidence of the returned candidates (0.0-1.0)
    pub confidence: f32,
    pub fallback_used: bool,
    pub processing_time_ms: u64,
}

impl RecommendationResult {
    pub fn new(
        recommendations: Vec<RecommendationCandidate>,
        source: RecommendationSource,
        processing_time_ms: u64,
    ) -> Self {
        let confidence = if recommendations.is_empty() {
            0.0
        } else {
            let sum: f32 = recommendations.iter().map(|c| c.confidence).sum();
            clamp_confidence(sum / recommendations.len() as f32)
        };

        Self {
            recommendations,
            source,
            confidence,
            fallback_used: source.is_fallback(),
            processing_time_ms,
        }
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
