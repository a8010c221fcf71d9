//! ChargeFlow Dashboard Gateway Library
//!
//! This library provides the thin HTTP gateway that fronts the
//! processor and analytics services for the dashboard frontend.

// Core modules
pub mod client;
pub mod config;
pub mod handlers;
pub mod reads;

// Re-export commonly used types
pub use client::{FeatureValues, GatewayClient};
pub use config::DashboardConfig;
pub use reads::RemoteReads;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub client: std::sync::Arc<GatewayClient>,
    pub reads: std::sync::Arc<RemoteReads>,
    pub config: std::sync::Arc<DashboardConfig>,
}

/// Create the main application router
pub fn create_router(state: AppState) -> axum::Router {
    use crate::handlers::*;
    use axum::routing::get;
    use tower::ServiceBuilder;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    axum::Router::new()
        // Health endpoint
        .route("/health", get(health_handler))
        // Proxied processor reads
        .route("/api/v1/headers", get(headers_handler))
        .route("/api/v1/records", get(records_handler))
        // Clustering relay
        .route("/api/v1/cluster", get(cluster_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
