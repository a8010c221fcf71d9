//! Long-lived telemetry subscription feeding the session store

use chargeflow_core::{ChargeError, ChargeResult, TelemetryEnvelope};
use futures::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::metrics::ProcessorMetrics;
use crate::storage::SessionStore;

/// Connection lifecycle, observable from the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberState {
    Disconnected,
    Connecting,
    Subscribed,
    Error,
}

/// Maintains one mutually-authenticated broker connection and forwards
/// each telemetry envelope to the store from the delivery context, so
/// storage latency backpressures consumption. Malformed payloads and
/// failed writes are logged and dropped; the message flow continues.
pub struct BrokerSubscriber {
    config: BrokerConfig,
    store: Arc<SessionStore>,
    metrics: Arc<ProcessorMetrics>,
    state: RwLock<SubscriberState>,
}

impl BrokerSubscriber {
    pub fn new(
        config: BrokerConfig,
        store: Arc<SessionStore>,
        metrics: Arc<ProcessorMetrics>,
    ) -> Self {
        Self {
            config,
            store,
            metrics,
            state: RwLock::new(SubscriberState::Disconnected),
        }
    }

    /// Current connection state
    pub fn state(&self) -> SubscriberState {
        *self.state.read()
    }

    /// Verify the mutual TLS credential files exist on disk. Called
    /// before any connection attempt; a missing file is a startup
    /// failure, not a retryable condition.
    pub fn verify_credentials(&self) -> ChargeResult<()> {
        for path in self.config.credential_paths() {
            if !Path::new(path).is_file() {
                return Err(ChargeError::broker(format!(
                    "Missing credential file: {}",
                    path
                )));
            }
        }
        Ok(())
    }

    /// Connect, subscribe, and consume until cancelled. Connection
    /// failures retry with doubling backoff up to the configured attempt
    /// limit, after which the subscriber parks in the Error state while
    /// the rest of the service keeps serving reads.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let client = match self.connect_with_retry(&shutdown).await {
            Ok(client) => client,
            Err(e) => {
                *self.state.write() = SubscriberState::Error;
                error!("Broker connection abandoned: {}", e);
                return;
            }
        };

        if let Err(e) = self.consume(client, &shutdown).await {
            *self.state.write() = SubscriberState::Error;
            error!("Broker subscription ended: {}", e);
        }
    }

    async fn connect_with_retry(
        &self,
        shutdown: &CancellationToken,
    ) -> ChargeResult<async_nats::Client> {
        let attempts = self.config.max_connect_attempts;
        let mut backoff = self.config.initial_backoff();

        for attempt in 1..=attempts {
            *self.state.write() = SubscriberState::Connecting;
            match self.connect_once().await {
                Ok(client) => {
                    info!("Connected to broker at {}", self.config.url());
                    return Ok(client);
                }
                Err(e) => {
                    warn!(
                        "Broker connect attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    if attempt == attempts {
                        break;
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            return Err(ChargeError::broker(
                                "Shutdown requested during connect".to_string(),
                            ));
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = backoff.saturating_mul(2);
                }
            }
        }

        Err(ChargeError::broker(format!(
            "Gave up connecting to {} after {} attempts",
            self.config.url(),
            attempts
        )))
    }

    async fn connect_once(&self) -> ChargeResult<async_nats::Client> {
        let options = async_nats::ConnectOptions::new()
            .user_and_password(self.config.username.clone(), self.config.password.clone())
            .require_tls(true)
            .add_root_certificates(PathBuf::from(&self.config.ca_cert))
            .add_client_certificate(
                PathBuf::from(&self.config.client_cert),
                PathBuf::from(&self.config.client_key),
            )
            .connection_timeout(self.config.connect_timeout());

        options
            .connect(self.config.url())
            .await
            .map_err(|e| ChargeError::broker(format!("Connect to {}: {}", self.config.url(), e)))
    }

    async fn consume(
        &self,
        client: async_nats::Client,
        shutdown: &CancellationToken,
    ) -> ChargeResult<()> {
        let mut subscription = client
            .subscribe(self.config.subject.clone())
            .await
            .map_err(|e| {
                ChargeError::broker(format!("Subscribe to {}: {}", self.config.subject, e))
            })?;

        *self.state.write() = SubscriberState::Subscribed;
        info!("Subscribed to telemetry subject {}", self.config.subject);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Subscriber stopping");
                    *self.state.write() = SubscriberState::Disconnected;
                    return Ok(());
                }
                message = subscription.next() => {
                    match message {
                        Some(msg) => self.handle_message(&msg.payload).await,
                        None => {
                            return Err(ChargeError::broker(
                                "Subscription closed by the broker".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Decode one telemetry payload and forward it to storage
    pub async fn handle_message(&self, payload: &[u8]) {
        self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);

        let envelope = match TelemetryEnvelope::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping malformed telemetry payload: {}", e);
                return;
            }
        };

        match envelope.event_time() {
            Ok(stamped) => debug!("Processing telemetry envelope stamped {}", stamped),
            Err(e) => debug!("Envelope carries an unusable timestamp: {}", e),
        }

        match self.store.upsert_session(&envelope.data).await {
            Ok(()) => {
                self.metrics.messages_ingested.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping telemetry message after storage failure: {}", e);
            }
        }
    }
}
