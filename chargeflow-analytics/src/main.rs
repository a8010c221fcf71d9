use anyhow::Result;
use chargeflow_analytics::{
    create_router, AnalyticsConfig, AnalyticsMetrics, AppState, ClusteringEngine,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!(
        "Starting ChargeFlow analytics v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Arc::new(AnalyticsConfig::load()?);
    info!("Loaded configuration: {:?}", config);

    let engine = Arc::new(ClusteringEngine::new(config.clustering.clone()));
    let metrics = Arc::new(AnalyticsMetrics::new());

    // Create shared state
    let state = AppState {
        engine,
        metrics,
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_address).await?;
    let addr = listener.local_addr()?;
    info!("ChargeFlow analytics listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ChargeFlow analytics stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install ctrl-c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
