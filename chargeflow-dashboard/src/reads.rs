//! Cached gateway reads over the processor API
//!
//! The gateway keeps its own max-age caches in front of the processor
//! so that dashboard traffic does not translate one-to-one into
//! upstream requests. Headers change only when the ingest schema
//! changes and stay fresh for thirty minutes; the record set follows
//! live ingest and is capped at five seconds.

use chargeflow_core::{MaxAgeCache, LIVE_READ_MAX_AGE_SECS, SLOW_READ_MAX_AGE_SECS};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::client::GatewayClient;

/// Processor reads proxied through the gateway's own caches.
///
/// Upstream failures degrade to empty values rather than surfacing to
/// the dashboard. The empty result is cached like any other, so a
/// down processor is retried once per expiry window instead of on
/// every page load.
pub struct RemoteReads {
    client: Arc<GatewayClient>,
    headers: MaxAgeCache<Vec<String>>,
    records: MaxAgeCache<Value>,
}

impl RemoteReads {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self {
            client,
            headers: MaxAgeCache::new(Duration::from_secs(SLOW_READ_MAX_AGE_SECS)),
            records: MaxAgeCache::new(Duration::from_secs(LIVE_READ_MAX_AGE_SECS)),
        }
    }

    /// Session column headers, empty when the processor is unreachable
    pub async fn headers(&self) -> Vec<String> {
        self.headers
            .get_with(|| async {
                match self.client.headers().await {
                    Ok(headers) => headers,
                    Err(e) => {
                        warn!("Headers fetch failed, serving empty result: {}", e);
                        Vec::new()
                    }
                }
            })
            .await
    }

    /// Full record set, empty when the processor is unreachable
    pub async fn records(&self) -> Value {
        self.records
            .get_with(|| async {
                match self.client.records().await {
                    Ok(records) => records,
                    Err(e) => {
                        warn!("Records fetch failed, serving empty result: {}", e);
                        empty_records()
                    }
                }
            })
            .await
    }
}

fn empty_records() -> Value {
    json!({ "headers": [], "rows": [] })
}
