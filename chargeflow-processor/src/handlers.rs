use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chargeflow_core::{Station, StationStatus};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::storage::RecordSet;
use crate::AppState;

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "chargeflow-processor",
        "version": env!("CARGO_PKG_VERSION"),
        "subscriber": state.subscriber.state(),
        "pool_available": state.store.pool().available_permits(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Column headers of the session table
pub async fn headers_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.reads.headers().await)
}

/// Every stored charging session
pub async fn records_handler(State(state): State<AppState>) -> Json<RecordSet> {
    let records = state.reads.all_records().await;
    debug!("Returned {} session records", records.rows.len());
    Json(records)
}

/// Distinct user ids, sorted
pub async fn users_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.reads.users().await)
}

/// Sessions belonging to one user, user id column stripped
pub async fn user_records_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<RecordSet> {
    let records = state.reads.records_for_user(&user_id).await;
    debug!(
        "Returned {} session records for user '{}'",
        records.rows.len(),
        user_id
    );
    Json(records)
}

/// All charging stations with their coordinates
pub async fn stations_handler(State(state): State<AppState>) -> Json<Vec<Station>> {
    Json(state.reads.stations().await)
}

/// All stations, each flagged if the given user has charged there
pub async fn user_stations_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<StationStatus>> {
    Json(state.reads.stations_for_user(&user_id).await)
}

/// Paired values of two session columns, for downstream clustering
pub async fn features_handler(
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

    match state.reads.feature_values(feature_x, feature_y).await {
        Ok(values) => {
            debug!(
                "Returned {} value pairs for features '{}' and '{}'",
                values.len(),
                feature_x,
                feature_y
            );
            Ok(Json(json!({
                "x": feature_x,
                "y": feature_y,
                "values": values
            })))
        }
        Err(err) => {
            warn!("Feature extraction failed: {}", err);
            let status_code = match err.category() {
                "validation" => StatusCode::BAD_REQUEST,
                "timeout" => StatusCode::REQUEST_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };

            Err((
                status_code,
                Json(json!({
                    "error": "Feature extraction failed",
                    "message": err.to_string(),
                    "category": err.category()
                })),
            ))
        }
    }
}
