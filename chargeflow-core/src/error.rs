//! Error types for ChargeFlow operations

use thiserror::Error;

/// Result type for ChargeFlow operations
pub type ChargeResult<T> = Result<T, ChargeError>;

/// Error types shared across the ChargeFlow services
#[derive(Error, Debug)]
pub enum ChargeError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Clustering failed: {0}")]
    Clustering(String),

    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout error: operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ChargeError {
    /// Create a new database error
    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database(message.into())
    }

    /// Create a new pool error
    pub fn pool<S: Into<String>>(message: S) -> Self {
        Self::Pool(message.into())
    }

    /// Create a new broker error
    pub fn broker<S: Into<String>>(message: S) -> Self {
        Self::Broker(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new policy error
    pub fn policy<S: Into<String>>(message: S) -> Self {
        Self::Policy(message.into())
    }

    /// Create a new clustering error
    pub fn clustering<S: Into<String>>(message: S) -> Self {
        Self::Clustering(message.into())
    }

    /// Create a new bootstrap error
    pub fn bootstrap<S: Into<String>>(message: S) -> Self {
        Self::Bootstrap(message.into())
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a retriable error
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ChargeError::Broker(_)
                | ChargeError::Pool(_)
                | ChargeError::Timeout { .. }
                | ChargeError::Io(_)
        )
    }

    /// Get the error category for monitoring/metrics
    pub fn category(&self) -> &'static str {
        match self {
            ChargeError::Database(_) => "database",
            ChargeError::Pool(_) => "pool",
            ChargeError::Broker(_) => "broker",
            ChargeError::Validation(_) => "validation",
            ChargeError::Policy(_) => "policy",
            ChargeError::Clustering(_) => "clustering",
            ChargeError::Bootstrap(_) => "bootstrap",
            ChargeError::Configuration(_) => "configuration",
            ChargeError::Timeout { .. } => "timeout",
            ChargeError::Internal(_) => "internal",
            ChargeError::Io(_) => "io",
            ChargeError::Json(_) => "json",
            ChargeError::Parse(_) => "parse",
        }
    }
}

impl From<rusqlite::Error> for ChargeError {
    fn from(err: rusqlite::Error) -> Self {
        ChargeError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(ChargeError::validation("bad column").category(), "validation");
        assert_eq!(ChargeError::policy("too many features").category(), "policy");
        assert_eq!(ChargeError::clustering("fit diverged").category(), "clustering");
        assert_eq!(ChargeError::Timeout { timeout_ms: 500 }.category(), "timeout");
    }

    #[test]
    fn test_retriable_classification() {
        assert!(ChargeError::broker("connection reset").is_retriable());
        assert!(ChargeError::pool("exhausted").is_retriable());
        assert!(!ChargeError::validation("unknown feature").is_retriable());
        assert!(!ChargeError::clustering("singular input").is_retriable());
    }

    #[test]
    fn test_sqlite_error_maps_to_database() {
        let err = ChargeError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.category(), "database");
    }
}
