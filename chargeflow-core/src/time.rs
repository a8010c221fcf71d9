//! Event time handling for charging telemetry

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChargeError, ChargeResult};

/// Canonical storage format for session timestamps
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted textual formats, tried in order. Ambiguous numeric dates are
/// read day-first, matching the locale of the reference data set.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// A session event time, normalized to a naive wall-clock instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventTime(NaiveDateTime);

impl EventTime {
    /// Get the current event time (UTC wall clock)
    pub fn now() -> Self {
        Self(Utc::now().naive_utc())
    }

    /// Create from a naive date time
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        Self(dt)
    }

    /// Create from seconds since Unix epoch (fractional seconds truncated)
    pub fn from_epoch_secs(secs: f64) -> ChargeResult<Self> {
        if !secs.is_finite() {
            return Err(ChargeError::parse(format!("Invalid epoch seconds: {}", secs)));
        }
        match Utc.timestamp_opt(secs.trunc() as i64, 0) {
            chrono::LocalResult::Single(dt) => Ok(Self(dt.naive_utc())),
            _ => Err(ChargeError::parse(format!("Invalid epoch seconds: {}", secs))),
        }
    }

    /// Parse a textual timestamp, trying RFC 3339 first and then the
    /// accepted local formats
    pub fn parse(input: &str) -> ChargeResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ChargeError::parse("Empty timestamp".to_string()));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(dt.with_timezone(&Utc).naive_utc()));
        }

        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self(dt));
            }
        }

        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                    return Ok(Self(dt));
                }
            }
        }

        Err(ChargeError::parse(format!("Unrecognized timestamp: {}", trimmed)))
    }

    /// Format in the canonical storage form
    pub fn to_storage(&self) -> String {
        self.0.format(STORAGE_FORMAT).to_string()
    }

    /// Get the underlying naive date time
    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Seconds since Unix epoch, treating the wall clock as UTC
    pub fn timestamp(&self) -> i64 {
        self.0.and_utc().timestamp()
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_storage())
    }
}

impl From<NaiveDateTime> for EventTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_datetime() {
        let t = EventTime::parse("2024-09-01 14:30:00").unwrap();
        assert_eq!(t.to_storage(), "2024-09-01 14:30:00");
    }

    #[test]
    fn test_parse_rfc3339() {
        let t = EventTime::parse("2024-09-01T14:30:00Z").unwrap();
        assert_eq!(t.to_storage(), "2024-09-01 14:30:00");
    }

    #[test]
    fn test_parse_day_first() {
        // 03-04-2024 is the 3rd of April, not March 4th
        let t = EventTime::parse("03-04-2024 08:15").unwrap();
        assert_eq!(t.to_storage(), "2024-04-03 08:15:00");

        let t = EventTime::parse("25/12/2023 23:59:59").unwrap();
        assert_eq!(t.to_storage(), "2023-12-25 23:59:59");
    }

    #[test]
    fn test_parse_date_only_defaults_to_midnight() {
        let t = EventTime::parse("2024-09-01").unwrap();
        assert_eq!(t.to_storage(), "2024-09-01 00:00:00");

        let t = EventTime::parse("01/09/2024").unwrap();
        assert_eq!(t.to_storage(), "2024-09-01 00:00:00");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(EventTime::parse("not a time").is_err());
        assert!(EventTime::parse("").is_err());
        assert!(EventTime::parse("2024-99-99 00:00:00").is_err());
    }

    #[test]
    fn test_from_epoch_secs() {
        let t = EventTime::from_epoch_secs(1_700_000_000.75).unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
        assert!(EventTime::from_epoch_secs(f64::NAN).is_err());
    }

    #[test]
    fn test_ordering() {
        let a = EventTime::parse("2024-01-01 00:00:00").unwrap();
        let b = EventTime::parse("2024-01-02 00:00:00").unwrap();
        assert!(a < b);
    }
}
