//! Integration tests for bowl-re API endpoints
//!
//! Tests cover:
//! - POST /api/recommendations success and validation errors
//! - GET /health with engine statistics

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use bowl_re::engine::TokioClock;
use bowl_re::providers::MenuCatalog;
use bowl_re::{build_router, AppState};
use helpers::{bowl, candidates, engine, FakePersonalization};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: app backed by the bundled menu
fn setup_app(personalization: FakePersonalization) -> axum::Router {
    let catalog = MenuCatalog::bundled(Arc::new(TokioClock), Duration::from_secs(3600))
        .expect("bundled menu should parse");
    let engine = engine(Arc::new(personalization), Arc::new(catalog));
    build_router(AppState::new(engine))
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// POST /api/recommendations
// =============================================================================

#[tokio::test]
async fn test_recommendations_personalized() {
    let app = setup_app(FakePersonalization::returning(candidates(
        vec![bowl("chef-pick", vec![]), bowl("runner-up", vec![])],
        0.9,
    )));

    let response = app
        .oneshot(post_json(
            "/api/recommendations",
            &json!({ "location_id": "downtown", "user_id": "alice" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["source"], "ml");
    assert_eq!(json["fallback_used"], false);
    assert_eq!(json["recommendations"].as_array().unwrap().len(), 2);
    assert_eq!(json["recommendations"][0]["bowl"]["id"], "chef-pick");
    assert!(json["processing_time_ms"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn test_recommendations_fallback_honours_allergens() {
    let app = setup_app(FakePersonalization::failing());

    let response = app
        .oneshot(post_json(
            "/api/recommendations",
            &json!({
                "location_id": "downtown",
                "dietary_restrictions": ["vegan"],
                "allergens": ["soy", "sesame"],
                "limit": 3
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["fallback_used"], true);
    assert_ne!(json["source"], "ml");

    let recommendations = json["recommendations"].as_array().unwrap();
    assert!(!recommendations.is_empty() && recommendations.len() <= 3);
    for recommendation in recommendations {
        let bowl = &recommendation["bowl"];
        let mut parts: Vec<&Value> = vec![&bowl["base"]];
        parts.extend(bowl["protein"].as_object().map(|_| &bowl["protein"]));
        parts.extend(bowl["sauce"].as_object().map(|_| &bowl["sauce"]));
        parts.extend(bowl["sides"].as_array().unwrap().iter());
        parts.extend(bowl["garnishes"].as_array().unwrap().iter());

        for ingredient in parts {
            let allergens = ingredient["allergens"].as_array().unwrap();
            assert!(!allergens.contains(&json!("soy")));
            assert!(!allergens.contains(&json!("sesame")));
            assert!(ingredient["suitable_for"].as_array().unwrap().contains(&json!("vegan")));
        }
    }
}

#[tokio::test]
async fn test_recommendations_unknown_allergen_is_400() {
    let app = setup_app(FakePersonalization::failing());

    let response = app
        .oneshot(post_json(
            "/api/recommendations",
            &json!({ "location_id": "downtown", "allergens": ["kryptonite"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert!(json["error"]["message"].as_str().unwrap().contains("kryptonite"));
}

#[tokio::test]
async fn test_recommendations_invalid_limit_is_400() {
    let app = setup_app(FakePersonalization::failing());

    let response = app
        .oneshot(post_json(
            "/api/recommendations",
            &json!({ "location_id": "downtown", "limit": 0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_recommendations_malformed_body_is_400() {
    let app = setup_app(FakePersonalization::failing());

    let response = app
        .oneshot(post_json("/api/recommendations", &json!({ "allergens": ["soy"] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

// =============================================================================
// GET /health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(FakePersonalization::failing());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "bowl-re");
    assert!(json["version"].is_string());
    assert_eq!(json["engine"]["cache_entries"], 0);
    assert_eq!(json["engine"]["primary_wins"], 0);
}
