//! ChargeFlow Processor Service Library
//!
//! This library provides the core components for the ChargeFlow processor
//! service: broker ingestion, session storage, and the cached read API.

// Core modules
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod reads;
pub mod storage;
pub mod subscriber;

// Re-export commonly used types
pub use config::ProcessorConfig;
pub use metrics::ProcessorMetrics;
pub use reads::CachedReads;
pub use storage::SessionStore;
pub use subscriber::{BrokerSubscriber, SubscriberState};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: std::sync::Arc<SessionStore>,
    pub reads: std::sync::Arc<CachedReads>,
    pub subscriber: std::sync::Arc<BrokerSubscriber>,
    pub metrics: std::sync::Arc<ProcessorMetrics>,
    pub config: std::sync::Arc<ProcessorConfig>,
}

/// Create the main application router
pub fn create_router(state: AppState) -> axum::Router {
    use crate::handlers::*;
    use axum::routing::get;
    use tower::ServiceBuilder;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    axum::Router::new()
        // Health and monitoring endpoints
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Session read endpoints
        .route("/api/v1/headers", get(headers_handler))
        .route("/api/v1/records", get(records_handler))
        .route("/api/v1/users", get(users_handler))
        .route("/api/v1/users/:user_id/records", get(user_records_handler))
        // Station read endpoints
        .route("/api/v1/stations", get(stations_handler))
        .route(
            "/api/v1/users/:user_id/stations",
            get(user_stations_handler),
        )
        // Feature extraction for downstream clustering
        .route("/api/v1/features", get(features_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
