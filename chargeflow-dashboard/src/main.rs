use anyhow::Result;
use chargeflow_dashboard::{create_router, AppState, DashboardConfig, GatewayClient, RemoteReads};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!(
        "Starting ChargeFlow dashboard v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Arc::new(DashboardConfig::load()?);
    info!("Loaded configuration: {:?}", config);

    let client = Arc::new(GatewayClient::new(&config)?);
    let reads = Arc::new(RemoteReads::new(client.clone()));

    // Create shared state
    let state = AppState {
        client,
        reads,
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_address).await?;
    let addr = listener.local_addr()?;
    info!("ChargeFlow dashboard listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ChargeFlow dashboard stopped");
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
