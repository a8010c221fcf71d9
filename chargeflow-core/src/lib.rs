//! # ChargeFlow Core Library
//!
//! Shared library providing domain types and utilities for the ChargeFlow
//! processor, analytics, and dashboard services.
//!
//! ## Features
//!
//! - **Data Types**: Charging session records, station reference data, and
//!   the telemetry wire envelope
//! - **Time**: Event-time parsing with day-first locale tolerance and a
//!   canonical storage form
//! - **Caching**: Staleness-bounded memoization for expensive reads
//! - **Errors**: A shared error taxonomy with monitoring categories
//!
//! ## Architecture
//!
//! This library is designed to be shared between the services, providing a
//! common foundation for:
//! - Schema compatibility between ingestion and reads
//! - Consistent error classification across HTTP surfaces
//! - One caching contract for local and remote reads

pub mod cache;
pub mod error;
pub mod session;
pub mod station;
pub mod time;

// Re-export commonly used types
pub use cache::{KeyedMaxAgeCache, MaxAgeCache};
pub use error::{ChargeError, ChargeResult};
pub use session::{
    ColumnDef, ColumnType, FieldValue, TelemetryEnvelope, SESSION_COLUMNS, SESSION_KEY_COLUMNS,
    SESSION_TABLE,
};
pub use station::{Station, StationStatus, STATION_COLUMNS, STATION_TABLE};
pub use time::EventTime;

/// Version information for ChargeFlow
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of feature columns a clustering request must name
pub const CLUSTER_FEATURE_COUNT: usize = 2;

/// Upper bound (exclusive of data size) on candidate cluster counts
pub const MAX_CANDIDATE_CLUSTERS: usize = 11;

/// Maximum age for slow-moving reads (column headers, user list)
pub const SLOW_READ_MAX_AGE_SECS: u64 = 30 * 60;

/// Maximum age for live reads (records, stations)
pub const LIVE_READ_MAX_AGE_SECS: u64 = 5;
