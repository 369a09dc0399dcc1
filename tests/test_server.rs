//! Integration test: scoring service endpoints

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use churn_harness::data::ChurnGenerator;
use churn_harness::preprocessing::{DatasetPreparer, FeatureEncoder, PreparationConfig};
use churn_harness::scoring::ScoringModel;
use churn_harness::server::{create_router, AppState, ScoreResponse, ServerConfig};
use churn_harness::training::{Classifier, ClassifierKind, ParamSet};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn scoring_model() -> ScoringModel {
    let df = ChurnGenerator::new(300).with_seed(4).generate().unwrap();
    let (dataset, _) = DatasetPreparer::new(PreparationConfig::default()).prepare(&df).unwrap();
    let encoder = FeatureEncoder::fit(&dataset);
    let x = encoder.transform(&dataset).unwrap();
    let y = FeatureEncoder::labels(&dataset);
    let params = ParamSet::new().with("max_depth", 4i64);
    let model = ClassifierKind::DecisionTree.adapter().fit(&x, &y, &params, 42).unwrap();
    ScoringModel::new(encoder, model, params, 0.5, "Exited").unwrap()
}

fn test_config(model_path: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_path,
    }
}

fn test_app(model: Option<ScoringModel>) -> axum::Router {
    let config = test_config(PathBuf::from("/nonexistent/churn_model.json"));
    create_router(Arc::new(AppState::new(config, model)))
}

fn customer() -> Value {
    json!({
        "CreditScore": 610,
        "Geography": "Germany",
        "Gender": "Female",
        "Age": 51,
        "Tenure": 3,
        "Balance": 120500.25,
        "NumOfProducts": 1,
        "HasCrCard": 1,
        "IsActiveMember": 0,
        "EstimatedSalary": 70321.5
    })
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Health and model description
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_app(Some(scoring_model()))
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_model_endpoint_describes_schema() {
    let response = test_app(Some(scoring_model()))
        .oneshot(Request::builder().uri("/api/model").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["classifier"], "decision_tree");
    assert_eq!(body["display_name"], "Decision Tree");
    assert_eq!(body["threshold"], 0.5);
    let names: Vec<&str> = body["schema"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert!(names.contains(&"Geography"));
    assert!(names.contains(&"Age"));
}

// ============================================================================
// Scoring
// ============================================================================

#[tokio::test]
async fn test_score_record() {
    let model = scoring_model();
    let record = serde_json::from_value(customer()).unwrap();
    let expected = model.score(&record).unwrap();

    let response = test_app(Some(model))
        .oneshot(post_json("/api/score", customer().to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let scored: ScoreResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(scored.probability, expected);
    assert_eq!(scored.churn, expected >= 0.5);
    assert_eq!(scored.threshold, 0.5);
}

#[tokio::test]
async fn test_score_rejects_unknown_level() {
    let mut record = customer();
    record["Geography"] = json!("Atlantis");
    let response = test_app(Some(scoring_model()))
        .oneshot(post_json("/api/score", record.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], true);
    assert!(body["message"].as_str().unwrap().contains("Geography"));
}

#[tokio::test]
async fn test_score_rejects_missing_field() {
    let mut record = customer();
    record.as_object_mut().unwrap().remove("Age");
    let response = test_app(Some(scoring_model()))
        .oneshot(post_json("/api/score", record.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_score_rejects_malformed_body() {
    let response = test_app(Some(scoring_model()))
        .oneshot(post_json("/api/score", "[1, 2, 3]".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_score_without_model() {
    let response = test_app(None)
        .oneshot(post_json("/api/score", customer().to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Reload and routing
// ============================================================================

#[tokio::test]
async fn test_reload_picks_up_saved_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn_model.json");
    scoring_model().save(&path).unwrap();

    let state = Arc::new(AppState::new(test_config(path), None));
    let app = create_router(state.clone());
    let response = app
        .oneshot(post_json("/api/model/reload", String::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.current_model().await.is_some());
}

#[tokio::test]
async fn test_reload_missing_file_fails() {
    let response = test_app(None)
        .oneshot(post_json("/api/model/reload", String::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let response = test_app(None)
        .oneshot(Request::builder().uri("/api/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = test_app(None)
        .oneshot(Request::builder().uri("/api/score").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
