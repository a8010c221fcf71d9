use anyhow::{Context, Result};
use chargeflow_core::MAX_CANDIDATE_CLUSTERS;
use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for the analytics service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Clustering engine configuration
    pub clustering: ClusteringConfig,
}

/// K-means engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Seed for deterministic centroid initialization
    pub seed: u64,

    /// Random restarts per fit, best inertia kept
    pub n_init: usize,

    /// Iteration cap for a single fit
    pub max_iterations: usize,

    /// Upper bound on the candidate cluster-count range
    pub max_candidates: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            clustering: ClusteringConfig::default(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            n_init: 10,
            max_iterations: 300,
            max_candidates: MAX_CANDIDATE_CLUSTERS,
        }
    }
}

impl AnalyticsConfig {
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
        if let Ok(bind_addr) = env::var("CHARGEFLOW_ANALYTICS_BIND_ADDRESS") {
            config.bind_address = bind_addr;
        }

        if let Ok(seed) = env::var("CHARGEFLOW_CLUSTERING_SEED") {
            config.clustering.seed = seed.parse()?;
        }

        if let Ok(n_init) = env::var("CHARGEFLOW_CLUSTERING_N_INIT") {
            config.clustering.n_init = n_init.parse()?;
        }

        if let Ok(max_iterations) = env::var("CHARGEFLOW_CLUSTERING_MAX_ITERATIONS") {
            config.clustering.max_iterations = max_iterations.parse()?;
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

        if self.clustering.n_init == 0 {
            return Err(anyhow::anyhow!("Clustering n_init must be greater than 0"));
        }

        if self.clustering.max_iterations == 0 {
            return Err(anyhow::anyhow!(
                "Clustering max_iterations must be greater than 0"
            ));
        }

        if self.clustering.max_candidates < 2 {
            return Err(anyhow::anyhow!(
                "Clustering max_candidates must be at least 2"
            ));
        }

        Ok(())
    }
}
