//! Error types for bowl-re
//!
//! - `TierError`: why a data source did not produce usable candidates.
//!   Always handled inside the engine by advancing to the next tier.
//! - `ApiError`: HTTP-facing errors with JSON bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bowl_common::{RecommendationSource, ValidationError};
use serde_json::json;
use thiserror::Error;

/// Failure of a single tier (including the primary personalization call)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierError {
    #[error("{tier} tier timed out after {timeout_ms} ms")]
    UpstreamTimeout {
        tier: RecommendationSource,
        timeout_ms: u64,
    },

    #[error("{tier} tier failed: {message}")]
    UpstreamFailure {
        tier: RecommendationSource,
        message: String,
    },

    #[error("{tier} tier produced no usable candidates")]
    EmptyResult { tier: RecommendationSource },
}

impl TierError {
    pub fn tier(&self) -> RecommendationSource {
        match self {
            TierError::UpstreamTimeout { tier, .. }
            | TierError::UpstreamFailure { tier, .. }
            | TierError::EmptyResult { tier } => *tier,
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed recommendation request (400)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Validation(err) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
