//! ChargeFlow Analytics Service Library
//!
//! This library provides the clustering engine and HTTP surface of the
//! ChargeFlow analytics service.

// Core modules
pub mod clustering;
pub mod config;
pub mod handlers;
pub mod metrics;

// Re-export commonly used types
pub use clustering::{Clustering, ClusteringEngine, Observation};
pub use config::AnalyticsConfig;
pub use metrics::AnalyticsMetrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: std::sync::Arc<ClusteringEngine>,
    pub metrics: std::sync::Arc<AnalyticsMetrics>,
    pub config: std::sync::Arc<AnalyticsConfig>,
}

/// Create the main application router
pub fn create_router(state: AppState) -> axum::Router {
    use crate::handlers::*;
    use axum::routing::{get, post};
    use tower::ServiceBuilder;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    axum::Router::new()
        // Health and monitoring endpoints
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Clustering endpoint
        .route("/api/v1/classify", post(classify_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
