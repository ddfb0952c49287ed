//! Test Helper Utilities
//!
//! Shared utilities for testing bowl-re

#![allow(dead_code)]

pub mod fixtures;
pub mod providers;

// Re-export commonly used items
pub use fixtures::{bowl, candidates, ingredient, plant, request};
pub use providers::{FakeCatalog, FakePersonalization};

use bowl_common::EngineParams;
use bowl_re::providers::{CatalogProvider, PersonalizationProvider};
use bowl_re::RecommendationEngine;
use std::sync::Arc;

/// Engine on the tokio clock with default parameters
pub fn engine(
    personalization: Arc<dyn PersonalizationProvider>,
    catalog: Arc<dyn CatalogProvider>,
) -> RecommendationEngine {
    engine_with_params(personalization, catalog, EngineParams::default())
}

pub fn engine_with_params(
    personalization: Arc<dyn PersonalizationProvider>,
    catalog: Arc<dyn CatalogProvider>,
    params: EngineParams,
) -> RecommendationEngine {
    RecommendationEngine::builder(personalization, catalog)
        .params(params)
        .build()
        .expect("test params should be valid")
}
