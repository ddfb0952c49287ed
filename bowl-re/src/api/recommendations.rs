//! Recommendation resolution endpoint
//!
//! POST /api/recommendations

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use bowl_common::{Allergen, DietaryRestriction, RecommendationRequest, RecommendationResult, ValidationError};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request body; enum values arrive as strings and are validated here
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationRequestBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    pub location_id: String,
    #[serde(default)]
    pub available_ingredient_ids: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl TryFrom<RecommendationRequestBody> for RecommendationRequest {
    type Error = ValidationError;

    fn try_from(body: RecommendationRequestBody) -> Result<Self, Self::Error> {
        let dietary = body
            .dietary_restrictions
            .iter()
            .map(|s| s.parse::<DietaryRestriction>())
            .collect::<Result<Vec<_>, _>>()?;
        let allergens = body
            .allergens
            .iter()
            .map(|s| s.parse::<Allergen>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = RecommendationRequest::builder(body.location_id)
            .dietary_restrictions(dietary)
            .allergens(allergens)
            .available_ingredients(body.available_ingredient_ids);
        if let Some(user_id) = body.user_id {
            builder = builder.user_id(user_id);
        }
        if let Some(limit) = body.limit {
            builder = builder.limit(limit);
        }
        builder.build()
    }
}

/// POST /api/recommendations
///
/// Always answers 200 for a valid request; 400 only for malformed input.
pub async fn resolve_recommendations(
    State(state): State<AppState>,
    payload: Result<Json<RecommendationRequestBody>, JsonRejection>,
) -> ApiResult<Json<RecommendationResult>> {
    let Json(body) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let request = RecommendationRequest::try_from(body)?;
    debug!(location = %request.location_id(), limit = request.limit(), "Recommendation request accepted");

    let result = state.engine.resolve(&request).await;
    Ok(Json(result.as_ref().clone()))
}

pub fn recommendation_routes() -> Router<AppState> {
    Router::new().route("/api/recommendations", post(resolve_recommendations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(location: &str) -> RecommendationRequestBody {
        RecommendationRequestBody {
            location_id: location.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_body_converts_enum_strings() {
        let request = RecommendationRequest::try_from(RecommendationRequestBody {
            dietary_restrictions: vec!["Gluten-Free".to_string(), "vegan".to_string()],
            allergens: vec!["tree_nuts".to_string()],
            limit: Some(3),
            ..body("downtown")
        })
        .unwrap();

        assert!(request.dietary_restrictions().contains(&DietaryRestriction::GlutenFree));
        assert!(request.dietary_restrictions().contains(&DietaryRestriction::Vegan));
        assert!(request.allergens().contains(&Allergen::TreeNuts));
        assert_eq!(request.limit(), 3);
    }

    #[test]
    fn test_body_rejects_unknown_values() {
        let err = RecommendationRequest::try_from(RecommendationRequestBody {
            allergens: vec!["kryptonite".to_string()],
            ..body("downtown")
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::UnknownAllergen("kryptonite".to_string()));

        let err = RecommendationRequest::try_from(body("  ")).unwrap_err();
        assert_eq!(err, ValidationError::EmptyLocation);
    }
}
