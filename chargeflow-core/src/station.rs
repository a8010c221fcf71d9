//! Charging station reference data

use serde::{Deserialize, Serialize};

use crate::session::{ColumnDef, ColumnType};

/// Stations table name
pub const STATION_TABLE: &str = "charging_stations";

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef { name, ty }
}

/// Schema of one charging station record
pub const STATION_COLUMNS: &[ColumnDef] = &[
    col("station_id", ColumnType::Text),
    col("name", ColumnType::Text),
    col("city", ColumnType::Text),
    col("operator", ColumnType::Text),
    col("latitude", ColumnType::Real),
    col("longitude", ColumnType::Real),
    col("power_kw", ColumnType::Real),
    col("charge_points", ColumnType::Integer),
    col("fast_charge", ColumnType::Integer),
    col("year_opened", ColumnType::Integer),
    col("network", ColumnType::Text),
];

/// Map-marker projection of a station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A station annotated with whether a given user has charged there
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatus {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub visited: bool,
}

impl StationStatus {
    /// Annotate a station with a visited flag
    pub fn from_station(station: Station, visited: bool) -> Self {
        Self {
            station_id: station.station_id,
            latitude: station.latitude,
            longitude: station.longitude,
            visited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_schema_shape() {
        assert_eq!(STATION_COLUMNS.len(), 11);
        assert_eq!(STATION_COLUMNS[0].name, "station_id");
        assert!(STATION_COLUMNS.iter().any(|c| c.name == "latitude"));
        assert!(STATION_COLUMNS.iter().any(|c| c.name == "longitude"));
    }

    #[test]
    fn test_visited_annotation() {
        let station = Station {
            station_id: "st-7".to_string(),
            latitude: 52.37,
            longitude: 4.89,
        };
        let status = StationStatus::from_station(station, true);
        assert_eq!(status.station_id, "st-7");
        assert!(status.visited);
    }
}
