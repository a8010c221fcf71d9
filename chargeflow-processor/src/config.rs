use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Configuration for the processor service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Database and pool configuration
    pub database: DatabaseConfig,

    /// Telemetry broker configuration
    pub broker: BrokerConfig,

    /// Reference data bootstrap configuration
    pub bootstrap: BootstrapConfig,
}

/// SQLite database and connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file
    pub path: String,

    /// Connections opened eagerly at startup
    pub min_idle: usize,

    /// Maximum simultaneously open connections
    pub max_connections: usize,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,

    /// Maximum wait for a free pool slot in milliseconds
    pub acquire_timeout_ms: u64,
}

/// Telemetry broker connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker host
    pub host: String,

    /// Broker port
    pub port: u16,

    /// Telemetry subject to subscribe to
    pub subject: String,

    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,

    /// Root CA certificate path
    pub ca_cert: String,

    /// Client certificate path
    pub client_cert: String,

    /// Client private key path
    pub client_key: String,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Connection attempts before giving up
    pub max_connect_attempts: u32,

    /// First retry delay in milliseconds, doubled per attempt
    pub initial_backoff_ms: u64,
}

/// Reference data bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Sessions data set, loaded when the sessions table is empty
    pub sessions_csv: Option<String>,

    /// Stations data set, loaded when the stations table is empty
    pub stations_csv: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            database: DatabaseConfig::default(),
            broker: BrokerConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "chargeflow.db".to_string(),
            min_idle: 1,
            max_connections: 10,
            busy_timeout_ms: 5000,
            acquire_timeout_ms: 5000,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4222,
            subject: "telemetry.ev.sessions".to_string(),
            username: "chargeflow".to_string(),
            password: "chargeflow".to_string(),
            ca_cert: "certs/ca.crt".to_string(),
            client_cert: "certs/client.crt".to_string(),
            client_key: "certs/client.key".to_string(),
            connect_timeout_ms: 5000,
            max_connect_attempts: 5,
            initial_backoff_ms: 1000,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            sessions_csv: Some("data/ev_sessions.csv".to_string()),
            stations_csv: Some("data/ev_stations.csv".to_string()),
        }
    }
}

impl ProcessorConfig {
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
        if let Ok(bind_addr) = env::var("CHARGEFLOW_BIND_ADDRESS") {
            config.bind_address = bind_addr;
        }

        if let Ok(path) = env::var("CHARGEFLOW_DB_PATH") {
            config.database.path = path;
        }

        if let Ok(max_connections) = env::var("CHARGEFLOW_DB_MAX_CONNECTIONS") {
            config.database.max_connections = max_connections.parse()?;
        }

        if let Ok(min_idle) = env::var("CHARGEFLOW_DB_MIN_IDLE") {
            config.database.min_idle = min_idle.parse()?;
        }

        if let Ok(host) = env::var("CHARGEFLOW_BROKER_HOST") {
            config.broker.host = host;
        }

        if let Ok(port) = env::var("CHARGEFLOW_BROKER_PORT") {
            config.broker.port = port.parse()?;
        }

        if let Ok(subject) = env::var("CHARGEFLOW_BROKER_SUBJECT") {
            config.broker.subject = subject;
        }

        if let Ok(username) = env::var("CHARGEFLOW_BROKER_USERNAME") {
            config.broker.username = username;
        }

        if let Ok(password) = env::var("CHARGEFLOW_BROKER_PASSWORD") {
            config.broker.password = password;
        }

        if let Ok(ca_cert) = env::var("CHARGEFLOW_BROKER_CA_CERT") {
            config.broker.ca_cert = ca_cert;
        }

        if let Ok(client_cert) = env::var("CHARGEFLOW_BROKER_CLIENT_CERT") {
            config.broker.client_cert = client_cert;
        }

        if let Ok(client_key) = env::var("CHARGEFLOW_BROKER_CLIENT_KEY") {
            config.broker.client_key = client_key;
        }

        if let Ok(sessions_csv) = env::var("CHARGEFLOW_SESSIONS_CSV") {
            config.bootstrap.sessions_csv =
                (!sessions_csv.is_empty()).then_some(sessions_csv);
        }

        if let Ok(stations_csv) = env::var("CHARGEFLOW_STATIONS_CSV") {
            config.bootstrap.stations_csv =
                (!stations_csv.is_empty()).then_some(stations_csv);
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

        if self.database.path.is_empty() {
            return Err(anyhow::anyhow!("Database path cannot be empty"));
        }

        if self.database.min_idle == 0 {
            return Err(anyhow::anyhow!("Pool min_idle must be greater than 0"));
        }

        if self.database.max_connections < self.database.min_idle {
            return Err(anyhow::anyhow!(
                "Pool max_connections must be at least min_idle"
            ));
        }

        if self.broker.subject.is_empty() {
            return Err(anyhow::anyhow!("Broker subject cannot be empty"));
        }

        if self.broker.max_connect_attempts == 0 {
            return Err(anyhow::anyhow!(
                "Broker max_connect_attempts must be greater than 0"
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Get the busy timeout as a Duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Get the pool acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl BrokerConfig {
    /// Broker URL in the form tls://host:port
    pub fn url(&self) -> String {
        format!("tls://{}:{}", self.host, self.port)
    }

    /// Get the connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the initial retry backoff as a Duration
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Paths of the credential files required before connecting
    pub fn credential_paths(&self) -> [&str; 3] {
        [&self.ca_cert, &self.client_cert, &self.client_key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.min_idle, 1);
    }

    #[test]
    fn test_validate_rejects_bad_pool_bounds() {
        let mut config = ProcessorConfig::default();
        config.database.min_idle = 8;
        config.database.max_connections = 4;
        assert!(config.validate().is_err());

        config.database.min_idle = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_broker_url_and_credentials() {
        let config = BrokerConfig::default();
        assert_eq!(config.url(), "tls://127.0.0.1:4222");
        assert_eq!(config.credential_paths().len(), 3);
    }
}
