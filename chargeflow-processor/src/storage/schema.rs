//! Schema DDL and header mapping for the session and station tables

use chargeflow_core::session::ColumnDef;
use chargeflow_core::{ChargeResult, SESSION_COLUMNS, SESSION_KEY_COLUMNS, SESSION_TABLE};
use chargeflow_core::{STATION_COLUMNS, STATION_TABLE};
use rusqlite::Connection;

fn column_list(columns: &[ColumnDef]) -> String {
    columns
        .iter()
        .map(|c| format!("    {} {}", c.name, c.ty.sql_type()))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// DDL for the sessions table, including the identity index that backs
/// idempotent ingestion
pub fn create_sessions_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n{columns}\n);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_identity\n\
         ON {table} ({keys});",
        table = SESSION_TABLE,
        columns = column_list(SESSION_COLUMNS),
        keys = SESSION_KEY_COLUMNS.join(", "),
    )
}

/// DDL for the stations table
pub fn create_stations_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n{columns}\n);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_station_id\n\
         ON {table} (station_id);",
        table = STATION_TABLE,
        columns = column_list(STATION_COLUMNS),
    )
}

/// Create both tables and their indexes if they do not exist
pub fn initialize_schema(conn: &Connection) -> ChargeResult<()> {
    conn.execute_batch(&create_sessions_table_sql())?;
    conn.execute_batch(&create_stations_table_sql())?;
    Ok(())
}

/// Check whether a table currently holds no rows
pub fn table_is_empty(conn: &Connection, table: &str) -> ChargeResult<bool> {
    let sql = format!("SELECT NOT EXISTS (SELECT 1 FROM {} LIMIT 1)", table);
    let empty: bool = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(empty)
}

/// Normalize a raw data-set header into its schema column name.
///
/// Lowercases, converts separators to underscores, strips parentheses and
/// unit glyphs, and collapses runs of underscores, so that headers like
/// `State of Charge (Start %)` map to `state_of_charge_start_pct`.
pub fn normalize_header(raw: &str) -> String {
    let mut name = raw.trim().to_lowercase();
    name = name.replace(' ', "_");
    name = name.replace(['(', ')'], "");
    name = name.replace('-', "_");
    name = name.replace('/', "_per_");
    name = name.replace('%', "pct");
    name = name.replace('°', "");
    while name.contains("__") {
        name = name.replace("__", "_");
    }
    name.trim_matches('_').to_string()
}
