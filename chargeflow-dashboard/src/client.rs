//! HTTP clients for the processor and analytics services

use chargeflow_core::{ChargeError, ChargeResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::DashboardConfig;

/// Paired feature columns as served by the processor
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureValues {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub values: Vec<(Value, Value)>,
}

/// Client for the processor and analytics services
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    processor_url: String,
    analytics_url: String,
}

impl GatewayClient {
    pub fn new(config: &DashboardConfig) -> ChargeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ChargeError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            processor_url: config.processor_url.trim_end_matches('/').to_string(),
            analytics_url: config.analytics_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the session column headers from the processor
    pub async fn headers(&self) -> ChargeResult<Vec<String>> {
        self.get_json(&format!("{}/api/v1/headers", self.processor_url))
            .await
    }

    /// Fetch the full record set from the processor
    pub async fn records(&self) -> ChargeResult<Value> {
        self.get_json(&format!("{}/api/v1/records", self.processor_url))
            .await
    }

    /// Fetch paired values for two feature columns from the processor
    pub async fn feature_values(&self, x: &str, y: &str) -> ChargeResult<FeatureValues> {
        let url = format!("{}/api/v1/features", self.processor_url);
        debug!("Fetching feature values for '{}'/'{}' from {}", x, y, url);

        let response = self
            .http
            .get(&url)
            .query(&[("x", x), ("y", y)])
            .send()
            .await
            .map_err(request_error)?;

        parse_response(response).await
    }

    /// Submit observations to the analytics service for clustering
    pub async fn classify(&self, observations: &[Value]) -> ChargeResult<Value> {
        let url = format!("{}/api/v1/classify", self.analytics_url);
        debug!(
            "Requesting clustering of {} observations from {}",
            observations.len(),
            url
        );

        let response = self
            .http
            .post(&url)
            .json(observations)
            .send()
            .await
            .map_err(request_error)?;

        parse_response(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ChargeResult<T> {
        debug!("Fetching {}", url);

        let response = self.http.get(url).send().await.map_err(request_error)?;
        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> ChargeResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        return Err(upstream_error(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| ChargeError::parse(format!("Unexpected upstream response shape: {}", e)))
}

fn request_error(e: reqwest::Error) -> ChargeError {
    ChargeError::internal(format!("Upstream request failed: {}", e))
}

/// Map a structured upstream error body back onto the originating
/// error category so status codes survive the relay
fn upstream_error(status: reqwest::StatusCode, body: &[u8]) -> ChargeError {
    if let Ok(payload) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = payload["message"].as_str() {
            match payload["category"].as_str() {
                Some("validation") => return ChargeError::validation(message),
                Some("policy") => return ChargeError::policy(message),
                Some("clustering") => return ChargeError::clustering(message),
                _ => {}
            }
        }

        if let Some(message) = payload["error"].as_str() {
            return ChargeError::internal(format!(
                "Upstream returned status {}: {}",
                status, message
            ));
        }
    }

    ChargeError::internal(format!("Upstream returned status {}", status))
}
