//! Charging session records and the telemetry wire envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{ChargeError, ChargeResult};
use crate::time::EventTime;

/// Sessions table name
pub const SESSION_TABLE: &str = "charging_sessions";

/// Column types supported by the session and station tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Real,
    Integer,
    Timestamp,
}

impl ColumnType {
    /// SQL type name used in DDL
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Integer => "INTEGER",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef { name, ty }
}

/// Schema of one charging session record
pub const SESSION_COLUMNS: &[ColumnDef] = &[
    col("user_id", ColumnType::Text),
    col("vehicle_model", ColumnType::Text),
    col("battery_capacity_kwh", ColumnType::Real),
    col("charging_station_id", ColumnType::Text),
    col("charging_start_time", ColumnType::Timestamp),
    col("charging_end_time", ColumnType::Timestamp),
    col("energy_consumed_kwh", ColumnType::Real),
    col("charging_duration_hours", ColumnType::Real),
    col("charging_rate_kw", ColumnType::Real),
    col("charging_cost_usd", ColumnType::Real),
    col("time_of_day", ColumnType::Text),
    col("day_of_week", ColumnType::Text),
    col("state_of_charge_start_pct", ColumnType::Real),
    col("state_of_charge_end_pct", ColumnType::Real),
    col("distance_driven_km", ColumnType::Real),
    col("temperature_c", ColumnType::Real),
    col("vehicle_age_years", ColumnType::Integer),
];

/// Columns identifying one session for idempotent ingestion
pub const SESSION_KEY_COLUMNS: &[&str] = &[
    "user_id",
    "charging_station_id",
    "charging_start_time",
    "charging_end_time",
];

/// Look up a session column by name
pub fn session_column(name: &str) -> Option<&'static ColumnDef> {
    SESSION_COLUMNS.iter().find(|c| c.name == name)
}

/// One stored field value; mirrors the SQLite storage classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    /// Numeric view of the value, used by feature extraction
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Real(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Null => None,
        }
    }

    /// Convert a raw SQLite value
    pub fn from_sql_ref(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Integer(i) => FieldValue::Integer(i),
            ValueRef::Real(f) => FieldValue::Real(f),
            ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => FieldValue::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Coerce a JSON value into this column's type. Timestamps are
    /// normalized to the canonical storage form; numeric strings accept a
    /// decimal comma.
    pub fn coerce(column: &ColumnDef, value: &Value) -> ChargeResult<Self> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        match column.ty {
            ColumnType::Text => match value {
                Value::String(s) => Ok(FieldValue::Text(s.clone())),
                Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
                Value::Bool(b) => Ok(FieldValue::Text(b.to_string())),
                _ => Err(ChargeError::validation(format!(
                    "Column '{}' expects text, got {}",
                    column.name, value
                ))),
            },
            ColumnType::Real => match value {
                Value::Number(n) => n.as_f64().map(FieldValue::Real).ok_or_else(|| {
                    ChargeError::validation(format!("Column '{}' expects a number", column.name))
                }),
                Value::String(s) => parse_locale_f64(s).map(FieldValue::Real).ok_or_else(|| {
                    ChargeError::validation(format!(
                        "Column '{}' expects a number, got '{}'",
                        column.name, s
                    ))
                }),
                _ => Err(ChargeError::validation(format!(
                    "Column '{}' expects a number, got {}",
                    column.name, value
                ))),
            },
            ColumnType::Integer => match value {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Ok(FieldValue::Integer(i))
                    } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                        Ok(FieldValue::Integer(f as i64))
                    } else {
                        Err(ChargeError::validation(format!(
                            "Column '{}' expects an integer, got {}",
                            column.name, n
                        )))
                    }
                }
                Value::String(s) => s.trim().parse().map(FieldValue::Integer).map_err(|_| {
                    ChargeError::validation(format!(
                        "Column '{}' expects an integer, got '{}'",
                        column.name, s
                    ))
                }),
                _ => Err(ChargeError::validation(format!(
                    "Column '{}' expects an integer, got {}",
                    column.name, value
                ))),
            },
            ColumnType::Timestamp => match value {
                Value::String(s) => EventTime::parse(s)
                    .map(|t| FieldValue::Text(t.to_storage()))
                    .map_err(|e| {
                        ChargeError::validation(format!("Column '{}': {}", column.name, e))
                    }),
                Value::Number(n) => {
                    let secs = n.as_f64().ok_or_else(|| {
                        ChargeError::validation(format!(
                            "Column '{}' expects a timestamp",
                            column.name
                        ))
                    })?;
                    EventTime::from_epoch_secs(secs)
                        .map(|t| FieldValue::Text(t.to_storage()))
                        .map_err(|e| {
                            ChargeError::validation(format!("Column '{}': {}", column.name, e))
                        })
                }
                _ => Err(ChargeError::validation(format!(
                    "Column '{}' expects a timestamp, got {}",
                    column.name, value
                ))),
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, ""),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Real(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
        }
    }
}

impl rusqlite::types::ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value, ValueRef};
        match self {
            FieldValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            FieldValue::Text(s) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
            FieldValue::Real(v) => Ok(ToSqlOutput::Owned(Value::Real(*v))),
            FieldValue::Integer(v) => Ok(ToSqlOutput::Owned(Value::Integer(*v))),
        }
    }
}

/// Parse a float accepting either '.' or ',' as the decimal separator
pub fn parse_locale_f64(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse().ok()
}

/// The broker payload: a delivery timestamp plus the nested session fields
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryEnvelope {
    pub timestamp: f64,
    pub data: serde_json::Map<String, Value>,
}

impl TelemetryEnvelope {
    /// Decode an envelope from raw message bytes
    pub fn from_slice(bytes: &[u8]) -> ChargeResult<Self> {
        let envelope: TelemetryEnvelope = serde_json::from_slice(bytes)?;
        if envelope.data.is_empty() {
            return Err(ChargeError::validation(
                "Envelope 'data' object is empty".to_string(),
            ));
        }
        Ok(envelope)
    }

    /// Delivery time of the envelope
    pub fn event_time(&self) -> ChargeResult<EventTime> {
        EventTime::from_epoch_secs(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_real_from_number_and_string() {
        let column = session_column("energy_consumed_kwh").unwrap();
        assert_eq!(
            FieldValue::coerce(column, &json!(12.5)).unwrap(),
            FieldValue::Real(12.5)
        );
        assert_eq!(
            FieldValue::coerce(column, &json!("12,5")).unwrap(),
            FieldValue::Real(12.5)
        );
        assert!(FieldValue::coerce(column, &json!("twelve")).is_err());
    }

    #[test]
    fn test_coerce_timestamp_normalizes() {
        let column = session_column("charging_start_time").unwrap();
        let value = FieldValue::coerce(column, &json!("01/09/2024 14:30")).unwrap();
        assert_eq!(value, FieldValue::Text("2024-09-01 14:30:00".to_string()));
    }

    #[test]
    fn test_coerce_integer_rejects_fractional() {
        let column = session_column("vehicle_age_years").unwrap();
        assert_eq!(
            FieldValue::coerce(column, &json!(3)).unwrap(),
            FieldValue::Integer(3)
        );
        assert_eq!(
            FieldValue::coerce(column, &json!(3.0)).unwrap(),
            FieldValue::Integer(3)
        );
        assert!(FieldValue::coerce(column, &json!(3.7)).is_err());
    }

    #[test]
    fn test_coerce_null_passes_through() {
        let column = session_column("temperature_c").unwrap();
        assert_eq!(
            FieldValue::coerce(column, &Value::Null).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        let row = vec![
            FieldValue::Text("u1".to_string()),
            FieldValue::Real(9.5),
            FieldValue::Integer(4),
            FieldValue::Null,
        ];
        let rendered = serde_json::to_value(&row).unwrap();
        assert_eq!(rendered, json!(["u1", 9.5, 4, null]));
    }

    #[test]
    fn test_envelope_decode() {
        let raw = br#"{"timestamp": 1700000000.5, "data": {"user_id": "u1"}}"#;
        let envelope = TelemetryEnvelope::from_slice(raw).unwrap();
        assert_eq!(envelope.data["user_id"], json!("u1"));
        assert_eq!(envelope.event_time().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_envelope_rejects_malformed() {
        assert!(TelemetryEnvelope::from_slice(b"not json").is_err());
        assert!(TelemetryEnvelope::from_slice(br#"{"timestamp": 1}"#).is_err());
        assert!(TelemetryEnvelope::from_slice(br#"{"timestamp": 1, "data": []}"#).is_err());
        assert!(TelemetryEnvelope::from_slice(br#"{"timestamp": 1, "data": {}}"#).is_err());
    }

    #[test]
    fn test_session_schema_shape() {
        assert_eq!(SESSION_COLUMNS.len(), 17);
        assert_eq!(SESSION_COLUMNS[0].name, "user_id");
        for key in SESSION_KEY_COLUMNS {
            assert!(session_column(key).is_some());
        }
    }
}
