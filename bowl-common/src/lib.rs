//! # Bowl Common Library
//!
//! Shared code for the bowl recommendation services including:
//! - Domain model (requests, bowls, candidates, results)
//! - Request validation errors
//! - Engine parameters with range metadata
//! - Configuration loading

pub mod config;
pub mod error;
pub mod model;
pub mod params;

pub use error::{Error, Result};
pub use model::{
    Allergen, BowlComposition, DietaryRestriction, Ingredient, IngredientCategory, Nutrition,
    RecommendationCandidate, RecommendationRequest, RecommendationResult, RecommendationSource,
    ValidationError,
};
pub use params::EngineParams;
