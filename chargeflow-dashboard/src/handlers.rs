//! HTTP handlers for the dashboard gateway

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::AppState;

/// Health check endpoint
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "chargeflow-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Session column headers proxied from the processor
pub async fn headers_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.reads.headers().await)
}

/// Full record set proxied from the processor
pub async fn records_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.reads.records().await)
}

/// Cluster two feature columns of the session data
///
/// Pulls the paired feature values from the processor, reshapes them
/// into observations, and relays the analytics clustering result.
pub async fn cluster_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let feature_x = params.get("x").ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Missing required parameter 'x'"
            })),
        )
    })?;

    let feature_y = params.get("y").ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Missing required parameter 'y'"
            })),
        )
    })?;

    let features = match state.client.feature_values(feature_x, feature_y).await {
        Ok(features) => features,
        Err(err) => return relay_or_degrade("Feature extraction", err),
    };

    let observations: Vec<Value> = features
        .values
        .iter()
        .map(|(x, y)| {
            json!({
                "feature1_name": features.x,
                "feature2_name": features.y,
                "feature1_value": x.as_f64(),
                "feature2_value": y.as_f64()
            })
        })
        .collect();

    debug!(
        "Clustering {} observations for '{}'/'{}'",
        observations.len(),
        features.x,
        features.y
    );

    match state.client.classify(&observations).await {
        Ok(clustering) => Ok(Json(clustering)),
        Err(err) => relay_or_degrade("Clustering", err),
    }
}

/// Validation and policy failures surface to the caller with their
/// upstream status; transport failures degrade to the empty clustering
fn relay_or_degrade(
    operation: &str,
    err: chargeflow_core::ChargeError,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let status_code = match err.category() {
        "validation" | "policy" => StatusCode::BAD_REQUEST,
        "clustering" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => {
            warn!("{} failed, serving empty clustering: {}", operation, err);
            return Ok(Json(json!({ "centroids": [], "labeled_data": [] })));
        }
    };

    warn!("{} failed: {}", operation, err);
    Err((
        status_code,
        Json(json!({
            "error": format!("{} failed", operation),
            "message": err.to_string(),
            "category": err.category()
        })),
    ))
}
