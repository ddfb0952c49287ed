//! bowl-re library - Recommendation Engine module
//!
//! Resolves bowl recommendation requests within a latency budget: a
//! personalization call raced against a deadline, a fallback chain of
//! catalog tiers, result caching and request deduplication.

use axum::Router;
use chrono::{DateTime, Utc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod engine;
pub mod error;
pub mod providers;

pub use engine::RecommendationEngine;
pub use error::{ApiError, ApiResult, TierError};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: RecommendationEngine,
    /// Service start time, reported by the health endpoint
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: RecommendationEngine) -> Self {
        Self {
            engine,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::recommendation_routes())
        .merge(api::health_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
