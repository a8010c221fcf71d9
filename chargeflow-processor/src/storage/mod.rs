//! Storage layer: bounded SQLite pool, schema bootstrap, and the session
//! and station queries

pub mod bootstrap;
pub mod pool;
pub mod schema;

pub use pool::{ConnectionPool, PooledConnection};

use chargeflow_core::session::session_column;
use chargeflow_core::{
    ChargeError, ChargeResult, FieldValue, Station, StationStatus, SESSION_COLUMNS,
    SESSION_KEY_COLUMNS, SESSION_TABLE, STATION_COLUMNS, STATION_TABLE,
};
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{BootstrapConfig, DatabaseConfig};

/// Rows paired with their column headers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl RecordSet {
    /// An empty record set with no headers
    pub fn empty() -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// All session and station access goes through this store. Construction
/// opens the pool, creates the schema, and loads the bundled reference
/// data into empty tables; each of those failures is fatal. Individual
/// queries return their errors to the caller.
pub struct SessionStore {
    pool: ConnectionPool,
}

impl SessionStore {
    /// Open the database, create the schema, and bootstrap empty tables
    /// from the configured reference data sets
    pub async fn initialize(
        database: &DatabaseConfig,
        bootstrap: &BootstrapConfig,
    ) -> ChargeResult<Self> {
        let pool = ConnectionPool::open(
            Path::new(&database.path),
            database.min_idle,
            database.max_connections,
            database.busy_timeout(),
            database.acquire_timeout(),
        )?;
        let store = Self { pool };

        {
            let mut conn = store.pool.acquire().await?;
            schema::initialize_schema(&conn)?;
            store.ensure_reference_data(&mut conn, bootstrap)?;
        }
        info!("Session store ready on {}", database.path);

        Ok(store)
    }

    fn ensure_reference_data(
        &self,
        conn: &mut Connection,
        bootstrap_config: &BootstrapConfig,
    ) -> ChargeResult<()> {
        if let Some(path) = &bootstrap_config.sessions_csv {
            if schema::table_is_empty(conn, SESSION_TABLE)? {
                bootstrap::load_csv_into(conn, SESSION_TABLE, SESSION_COLUMNS, Path::new(path))?;
            } else {
                debug!("Sessions table already populated, skipping bootstrap");
            }
        }
        if let Some(path) = &bootstrap_config.stations_csv {
            if schema::table_is_empty(conn, STATION_TABLE)? {
                bootstrap::load_csv_into(conn, STATION_TABLE, STATION_COLUMNS, Path::new(path))?;
            } else {
                debug!("Stations table already populated, skipping bootstrap");
            }
        }
        Ok(())
    }

    /// Connection pool health view
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Ordered column names of the sessions table, read from the
    /// statement metadata rather than hard-coded
    pub async fn headers(&self) -> ChargeResult<Vec<String>> {
        let conn = self.pool.acquire().await?;
        let stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT 0", SESSION_TABLE))?;
        Ok(stmt.column_names().iter().map(|s| s.to_string()).collect())
    }

    /// Every stored session row
    pub async fn all_records(&self) -> ChargeResult<RecordSet> {
        let conn = self.pool.acquire().await?;
        Self::query_records(&conn, &format!("SELECT * FROM {}", SESSION_TABLE), params![])
    }

    /// Session rows for one user, with the user-id column stripped from
    /// both headers and rows
    pub async fn records_for_user(&self, user_id: &str) -> ChargeResult<RecordSet> {
        let conn = self.pool.acquire().await?;
        let mut records = Self::query_records(
            &conn,
            &format!("SELECT * FROM {} WHERE user_id = ?1", SESSION_TABLE),
            params![user_id],
        )?;

        if let Some(idx) = records.headers.iter().position(|h| h == "user_id") {
            records.headers.remove(idx);
            for row in &mut records.rows {
                row.remove(idx);
            }
        }
        Ok(records)
    }

    /// Distinct user identifiers, sorted
    pub async fn users(&self) -> ChargeResult<Vec<String>> {
        let conn = self.pool.acquire().await?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT user_id FROM {} WHERE user_id IS NOT NULL ORDER BY user_id",
            SESSION_TABLE
        ))?;
        let users = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(users)
    }

    /// All stations as map markers
    pub async fn stations(&self) -> ChargeResult<Vec<Station>> {
        let conn = self.pool.acquire().await?;
        Self::stations_on(&conn)
    }

    /// All stations, each flagged with whether the user has charged
    /// there. Two queries total: the station list, then one DISTINCT
    /// lookup of the user's stations restricted to that list.
    pub async fn stations_for_user(&self, user_id: &str) -> ChargeResult<Vec<StationStatus>> {
        let conn = self.pool.acquire().await?;
        let stations = Self::stations_on(&conn)?;
        if stations.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; stations.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT charging_station_id FROM {} \
             WHERE user_id = ? AND charging_station_id IN ({})",
            SESSION_TABLE, placeholders
        );
        let mut bind: Vec<&str> = Vec::with_capacity(stations.len() + 1);
        bind.push(user_id);
        for station in &stations {
            bind.push(station.station_id.as_str());
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut visited = HashSet::new();
        let mut rows = stmt.query(params_from_iter(bind))?;
        while let Some(row) = rows.next()? {
            visited.insert(row.get::<_, String>(0)?);
        }

        Ok(stations
            .into_iter()
            .map(|station| {
                let seen = visited.contains(&station.station_id);
                StationStatus::from_station(station, seen)
            })
            .collect())
    }

    /// Raw values for two named feature columns. Unknown column names are
    /// a validation error, not a degraded empty result.
    pub async fn feature_values(
        &self,
        feature_x: &str,
        feature_y: &str,
    ) -> ChargeResult<Vec<(FieldValue, FieldValue)>> {
        for name in [feature_x, feature_y] {
            if session_column(name).is_none() {
                return Err(ChargeError::validation(format!(
                    "Unknown feature column '{}'",
                    name
                )));
            }
        }

        let conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {}, {} FROM {}",
            feature_x, feature_y, SESSION_TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push((
                FieldValue::from_sql_ref(row.get_ref(0)?),
                FieldValue::from_sql_ref(row.get_ref(1)?),
            ));
        }
        Ok(values)
    }

    /// Idempotent upsert of one session from a flat key/value map.
    /// Unknown keys are ignored; the identity columns must be present.
    /// Re-delivering the same session updates the existing row in place.
    pub async fn upsert_session(&self, data: &serde_json::Map<String, Value>) -> ChargeResult<()> {
        let mut columns: Vec<&'static str> = Vec::new();
        let mut values: Vec<FieldValue> = Vec::new();
        for (key, value) in data {
            match session_column(key) {
                Some(column) => {
                    columns.push(column.name);
                    values.push(FieldValue::coerce(column, value)?);
                }
                None => debug!("Ignoring unknown session field '{}'", key),
            }
        }

        for key in SESSION_KEY_COLUMNS {
            let present = columns
                .iter()
                .position(|c| c == key)
                .map(|i| values[i] != FieldValue::Null)
                .unwrap_or(false);
            if !present {
                return Err(ChargeError::validation(format!(
                    "Missing identity field '{}'",
                    key
                )));
            }
        }

        let assignments: Vec<String> = columns
            .iter()
            .filter(|c| !SESSION_KEY_COLUMNS.contains(c))
            .map(|c| format!("{} = excluded.{}", c, c))
            .collect();
        let conflict_action = if assignments.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", assignments.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
            SESSION_TABLE,
            columns.join(", "),
            vec!["?"; columns.len()].join(", "),
            SESSION_KEY_COLUMNS.join(", "),
            conflict_action
        );

        let conn = self.pool.acquire().await?;
        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> ChargeResult<RecordSet> {
        let mut stmt = conn.prepare(sql)?;
        let headers: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let column_count = headers.len();

        let mut rows = stmt.query(bind)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(FieldValue::from_sql_ref(row.get_ref(idx)?));
            }
            records.push(values);
        }

        Ok(RecordSet {
            headers,
            rows: records,
        })
    }

    fn stations_on(conn: &Connection) -> ChargeResult<Vec<Station>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT station_id, latitude, longitude FROM {} ORDER BY station_id",
            STATION_TABLE
        ))?;
        let stations = stmt
            .query_map([], |row| {
                Ok(Station {
                    station_id: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn empty_store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let database = DatabaseConfig {
            path: dir.path().join("store_test.db").display().to_string(),
            ..DatabaseConfig::default()
        };
        let bootstrap = BootstrapConfig {
            sessions_csv: None,
            stations_csv: None,
        };
        let store = SessionStore::initialize(&database, &bootstrap).await.unwrap();
        (dir, store)
    }

    fn session(user: &str, station: &str, start: &str, energy: f64) -> serde_json::Map<String, Value> {
        json!({
            "user_id": user,
            "charging_station_id": station,
            "charging_start_time": start,
            "charging_end_time": "2024-05-01 10:00:00",
            "energy_consumed_kwh": energy,
        })
        .as_object()
        .unwrap()
        .clone()
    }

    async fn insert_station(store: &SessionStore, id: &str, lat: f64, lon: f64) {
        let conn = store.pool.acquire().await.unwrap();
        conn.execute(
            "INSERT INTO charging_stations (station_id, latitude, longitude) VALUES (?1, ?2, ?3)",
            params![id, lat, lon],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_headers_match_schema_order() {
        let (_dir, store) = empty_store().await;
        let headers = store.headers().await.unwrap();
        let expected: Vec<&str> = SESSION_COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(headers, expected);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (_dir, store) = empty_store().await;

        store
            .upsert_session(&session("u1", "s1", "2024-05-01 09:00:00", 10.0))
            .await
            .unwrap();
        store
            .upsert_session(&session("u1", "s1", "2024-05-01 09:00:00", 12.5))
            .await
            .unwrap();

        let records = store.all_records().await.unwrap();
        assert_eq!(records.rows.len(), 1);

        let energy_idx = records
            .headers
            .iter()
            .position(|h| h == "energy_consumed_kwh")
            .unwrap();
        assert_eq!(records.rows[0][energy_idx], FieldValue::Real(12.5));
    }

    #[tokio::test]
    async fn test_upsert_normalizes_timestamps_into_identity() {
        let (_dir, store) = empty_store().await;

        // Same instant in two textual formats must hit the same row
        store
            .upsert_session(&session("u1", "s1", "01/05/2024 09:00", 10.0))
            .await
            .unwrap();
        store
            .upsert_session(&session("u1", "s1", "2024-05-01 09:00:00", 11.0))
            .await
            .unwrap();

        let records = store.all_records().await.unwrap();
        assert_eq!(records.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_requires_identity_fields() {
        let (_dir, store) = empty_store().await;

        let mut data = session("u1", "s1", "2024-05-01 09:00:00", 10.0);
        data.remove("charging_end_time");
        let err = store.upsert_session(&data).await.unwrap_err();
        assert_eq!(err.category(), "validation");

        assert!(store.all_records().await.unwrap().rows.is_empty());
    }

    #[tokio::test]
    async fn test_records_for_user_strips_user_column() {
        let (_dir, store) = empty_store().await;
        store
            .upsert_session(&session("u1", "s1", "2024-05-01 09:00:00", 10.0))
            .await
            .unwrap();
        store
            .upsert_session(&session("u2", "s2", "2024-05-01 09:00:00", 20.0))
            .await
            .unwrap();

        let records = store.records_for_user("u1").await.unwrap();
        assert_eq!(records.rows.len(), 1);
        assert!(!records.headers.contains(&"user_id".to_string()));
        assert_eq!(records.headers.len(), SESSION_COLUMNS.len() - 1);
        assert!(!records.rows[0].contains(&FieldValue::Text("u1".to_string())));
    }

    #[tokio::test]
    async fn test_users_sorted_distinct() {
        let (_dir, store) = empty_store().await;
        store
            .upsert_session(&session("zoe", "s1", "2024-05-01 09:00:00", 1.0))
            .await
            .unwrap();
        store
            .upsert_session(&session("amy", "s1", "2024-05-02 09:00:00", 2.0))
            .await
            .unwrap();
        store
            .upsert_session(&session("amy", "s2", "2024-05-03 09:00:00", 3.0))
            .await
            .unwrap();

        assert_eq!(store.users().await.unwrap(), vec!["amy", "zoe"]);
    }

    #[tokio::test]
    async fn test_visited_flags_do_not_leak_between_users() {
        let (_dir, store) = empty_store().await;
        insert_station(&store, "s1", 1.0, 1.0).await;
        insert_station(&store, "s2", 2.0, 2.0).await;
        insert_station(&store, "s3", 3.0, 3.0).await;

        store
            .upsert_session(&session("u1", "s1", "2024-05-01 09:00:00", 1.0))
            .await
            .unwrap();
        store
            .upsert_session(&session("u1", "s1", "2024-05-02 09:00:00", 1.5))
            .await
            .unwrap();
        store
            .upsert_session(&session("u2", "s2", "2024-05-01 09:00:00", 2.0))
            .await
            .unwrap();

        let for_u1 = store.stations_for_user("u1").await.unwrap();
        assert_eq!(for_u1.len(), 3);
        let visited: Vec<&str> = for_u1
            .iter()
            .filter(|s| s.visited)
            .map(|s| s.station_id.as_str())
            .collect();
        assert_eq!(visited, vec!["s1"]);

        let for_unknown = store.stations_for_user("nobody").await.unwrap();
        assert!(for_unknown.iter().all(|s| !s.visited));
    }

    #[tokio::test]
    async fn test_feature_values_validates_columns() {
        let (_dir, store) = empty_store().await;
        store
            .upsert_session(&session("u1", "s1", "2024-05-01 09:00:00", 7.5))
            .await
            .unwrap();

        let values = store
            .feature_values("energy_consumed_kwh", "charging_cost_usd")
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0, FieldValue::Real(7.5));
        assert_eq!(values[0].1, FieldValue::Null);

        let err = store
            .feature_values("energy_consumed_kwh", "no_such_column")
            .await
            .unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("no_such_column"));
    }

    #[tokio::test]
    async fn test_unknown_envelope_fields_are_ignored() {
        let (_dir, store) = empty_store().await;
        let mut data = session("u1", "s1", "2024-05-01 09:00:00", 10.0);
        data.insert("firmware_version".to_string(), json!("2.4.1"));

        store.upsert_session(&data).await.unwrap();
        assert_eq!(store.all_records().await.unwrap().rows.len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_skips_populated_tables() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("sessions.csv");
        std::fs::write(
            &csv,
            "User ID;Charging Station ID;Charging Start Time;Charging End Time\n\
             u1;s1;2024-05-01 09:00:00;2024-05-01 10:00:00\n\
             u2;s2;2024-05-01 09:00:00;2024-05-01 10:00:00\n",
        )
        .unwrap();
        let database = DatabaseConfig {
            path: dir.path().join("store_test.db").display().to_string(),
            ..DatabaseConfig::default()
        };
        let bootstrap = BootstrapConfig {
            sessions_csv: Some(csv.display().to_string()),
            stations_csv: None,
        };

        let store = SessionStore::initialize(&database, &bootstrap).await.unwrap();
        assert_eq!(store.all_records().await.unwrap().rows.len(), 2);
        store
            .upsert_session(&session("u3", "s3", "2024-05-02 09:00:00", 5.0))
            .await
            .unwrap();
        drop(store);

        // A re-run over the populated table must not touch the data set;
        // the plain bootstrap INSERT would trip the identity index if it did.
        let store = SessionStore::initialize(&database, &bootstrap).await.unwrap();
        assert_eq!(store.all_records().await.unwrap().rows.len(), 3);
    }
}
