use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Configuration for the dashboard gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Base URL of the processor service
    pub processor_url: String,

    /// Base URL of the analytics service
    pub analytics_url: String,

    /// Upstream request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
            processor_url: "http://127.0.0.1:8080".to_string(),
            analytics_url: "http://127.0.0.1:8081".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from file, environment variables, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Try to load from config file first
        if let Ok(config_path) = env::var("CONFIG_PATH") {
            config = Self::load_from_file(&config_path)?;
        } else if std::path::Path::new("config/development.yaml").exists() {
            config = Self::load_from_file("config/development.yaml")?;
        } else if std::path::Path::new("config/production.yaml").exists() {
            config = Self::load_from_file("config/production.yaml")?;
        }

        // Override with environment variables if present
        if let Ok(bind_addr) = env::var("CHARGEFLOW_DASHBOARD_BIND_ADDRESS") {
            config.bind_address = bind_addr;
        }

        if let Ok(processor_url) = env::var("CHARGEFLOW_PROCESSOR_URL") {
            config.processor_url = processor_url;
        }

        if let Ok(analytics_url) = env::var("CHARGEFLOW_ANALYTICS_URL") {
            config.analytics_url = analytics_url;
        }

        if let Ok(timeout) = env::var("CHARGEFLOW_DASHBOARD_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = timeout.parse()?;
        }

        // Validate the loaded configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("Bind address cannot be empty"));
        }

        if self.processor_url.is_empty() {
            return Err(anyhow::anyhow!("Processor URL cannot be empty"));
        }

        if self.analytics_url.is_empty() {
            return Err(anyhow::anyhow!("Analytics URL cannot be empty"));
        }

        if self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!(
                "Request timeout must be greater than 0 milliseconds"
            ));
        }

        Ok(())
    }

    /// Get upstream request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
