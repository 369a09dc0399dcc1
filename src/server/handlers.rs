//! HTTP request handlers

use std::sync::Arc;
use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::data::RawRecord;
use crate::scoring::ScoringModel;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Score returned for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub probability: f64,
    pub churn: bool,
    pub threshold: f64,
}

async fn loaded_model(state: &AppState) -> Result<Arc<ScoringModel>> {
    state
        .current_model()
        .await
        .ok_or_else(|| ServerError::NotFound("No scoring model loaded".to_string()))
}

/// Liveness and model status
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let model_loaded = state.current_model().await.is_some();
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": model_loaded,
        "uptime_secs": uptime.num_seconds(),
    }))
}

/// Classifier, chosen configuration, threshold and the record schema
pub async fn get_model(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let model = loaded_model(&state).await?;
    Ok(Json(json!({
        "classifier": model.classifier,
        "display_name": model.classifier.display_name(),
        "params": model.params,
        "threshold": model.threshold,
        "label_column": model.label_column,
        "trained_at": model.trained_at.to_rfc3339(),
        "schema": model.schema(),
    })))
}

/// Churn probability for one record
pub async fn score(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ScoreResponse>> {
    let record: RawRecord = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("Record must be a JSON object of fields: {}", e)))?;
    let model = loaded_model(&state).await?;

    let probability = model.score(&record)?;
    debug!(probability, "Record scored");
    Ok(Json(ScoreResponse {
        probability,
        churn: probability >= model.threshold,
        threshold: model.threshold,
    }))
}

/// Reload the scoring model from the configured path
pub async fn reload_model(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let path = state.config.model_path.clone();
    let model = ScoringModel::load(&path)
        .map_err(|e| ServerError::Internal(format!("failed to load {}: {}", path.display(), e)))?;
    let classifier = model.classifier;
    state.replace_model(model).await;
    info!(path = %path.display(), classifier = %classifier, "Scoring model reloaded");
    Ok(Json(json!({ "reloaded": true, "classifier": classifier })))
}
