use anyhow::Result;
use chargeflow_processor::{
    create_router, AppState, BrokerSubscriber, CachedReads, ProcessorConfig, ProcessorMetrics,
    SessionStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!(
        "Starting ChargeFlow processor v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Arc::new(ProcessorConfig::load()?);
    info!("Loaded configuration: {:?}", config);

    // Open the session store, bootstrapping reference data if empty
    let store = Arc::new(SessionStore::initialize(&config.database, &config.bootstrap).await?);
    info!("Session store ready at {}", config.database.path);

    let metrics = Arc::new(ProcessorMetrics::new());
    let reads = Arc::new(CachedReads::new(store.clone(), metrics.clone()));

    // Missing broker credentials are a startup failure
    let subscriber = Arc::new(BrokerSubscriber::new(
        config.broker.clone(),
        store.clone(),
        metrics.clone(),
    ));
    subscriber.verify_credentials()?;

    let shutdown = CancellationToken::new();
    let subscriber_task = tokio::spawn(subscriber.clone().run(shutdown.clone()));

    // Create shared state
    let state = AppState {
        store,
        reads,
        subscriber,
        metrics,
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_address).await?;
    let addr = listener.local_addr()?;
    info!("ChargeFlow processor listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = subscriber_task.await {
        error!("Subscriber task panicked: {}", e);
    }

    info!("ChargeFlow processor stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM and cancels the shared token so the
/// subscriber loop stops alongside the HTTP server.
async fn shutdown_signal(token: CancellationToken) {
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

    token.cancel();
}
