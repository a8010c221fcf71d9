use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Map, Value};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

use crate::clustering::{Clustering, Observation};
use crate::AppState;

/// Health check endpoint
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "chargeflow-analytics",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Cluster a batch of two-feature observations
pub async fn classify_handler(
    State(state): State<AppState>,
    Json(observations): Json<Vec<Observation>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    debug!("Received {} observations for clustering", observations.len());
    state
        .metrics
        .classifications_total
        .fetch_add(1, Ordering::Relaxed);

    // The fit is CPU-bound, keep it off the request-serving threads
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.classify(&observations))
        .await
        .map_err(|e| {
            state
                .metrics
                .classification_errors
                .fetch_add(1, Ordering::Relaxed);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Clustering failed",
                    "message": e.to_string()
                })),
            )
        })?;

    match result {
        Ok(clustering) => {
            state
                .metrics
                .observations_clustered
                .fetch_add(clustering.points.len() as u64, Ordering::Relaxed);
            Ok(Json(clustering_response(&clustering)))
        }
        Err(err) => {
            state
                .metrics
                .classification_errors
                .fetch_add(1, Ordering::Relaxed);
            warn!("Clustering failed: {}", err);
            let status_code = match err.category() {
                "policy" | "validation" => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };

            Err((
                status_code,
                Json(json!({
                    "error": "Clustering failed",
                    "message": err.to_string(),
                    "category": err.category()
                })),
            ))
        }
    }
}

/// Wire shape: centroid pairs plus each point annotated with its cluster
fn clustering_response(clustering: &Clustering) -> Value {
    let labeled_data: Vec<Value> = clustering
        .points
        .iter()
        .zip(clustering.labels.iter())
        .map(|(point, &label)| {
            let mut entry = Map::new();
            entry.insert(clustering.feature_x.clone(), json!(point[0]));
            entry.insert(clustering.feature_y.clone(), json!(point[1]));
            entry.insert("cluster".to_string(), json!(label));
            Value::Object(entry)
        })
        .collect();

    json!({
        "centroids": clustering.centroids,
        "labeled_data": labeled_data
    })
}
