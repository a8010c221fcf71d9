//! One-shot bulk load of the bundled reference data sets

use chargeflow_core::session::{parse_locale_f64, ColumnDef, ColumnType, FieldValue};
use chargeflow_core::{ChargeError, ChargeResult, EventTime};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::info;

use super::schema::normalize_header;

/// Load a semicolon-delimited data set into `table` inside one
/// transaction, reusing a single prepared INSERT for every row.
///
/// Headers are normalized and matched against the table's columns; the
/// values tolerate a UTF-8 BOM, decimal commas, and day-first dates. Any
/// failure rolls the whole load back and surfaces the error.
pub fn load_csv_into(
    conn: &mut Connection,
    table: &str,
    columns: &'static [ColumnDef],
    path: &Path,
) -> ChargeResult<usize> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ChargeError::bootstrap(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut lines = content.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| ChargeError::bootstrap(format!("{} is empty", path.display())))?;

    let mapped: Vec<&ColumnDef> = header_line
        .split(';')
        .map(|header| {
            let name = normalize_header(header);
            columns
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| {
                    ChargeError::bootstrap(format!(
                        "Unknown column '{}' (normalized '{}') in {}",
                        header.trim(),
                        name,
                        path.display()
                    ))
                })
        })
        .collect::<ChargeResult<_>>()?;

    let insert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        mapped.iter().map(|c| c.name).collect::<Vec<_>>().join(", "),
        vec!["?"; mapped.len()].join(", "),
    );

    let tx = conn.transaction()?;
    let mut inserted = 0usize;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for (line_no, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() != mapped.len() {
                return Err(ChargeError::bootstrap(format!(
                    "Row {}: expected {} fields, found {}",
                    line_no + 2,
                    mapped.len(),
                    fields.len()
                )));
            }
            let values: Vec<FieldValue> = mapped
                .iter()
                .zip(fields.iter())
                .map(|(column, field)| {
                    parse_field(column, field).map_err(|e| {
                        ChargeError::bootstrap(format!("Row {}: {}", line_no + 2, e))
                    })
                })
                .collect::<ChargeResult<_>>()?;
            stmt.execute(params_from_iter(values.iter()))?;
            inserted += 1;
        }
    }
    tx.commit()?;

    info!("Loaded {} rows into {} from {}", inserted, table, path.display());
    Ok(inserted)
}

/// Parse one raw field into the column's storage value. Empty fields
/// load as NULL.
fn parse_field(column: &ColumnDef, raw: &str) -> ChargeResult<FieldValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(FieldValue::Null);
    }
    match column.ty {
        ColumnType::Text => Ok(FieldValue::Text(trimmed.to_string())),
        ColumnType::Real => parse_locale_f64(trimmed).map(FieldValue::Real).ok_or_else(|| {
            ChargeError::validation(format!(
                "Column '{}' expects a number, got '{}'",
                column.name, trimmed
            ))
        }),
        ColumnType::Integer => match trimmed.parse::<i64>() {
            Ok(i) => Ok(FieldValue::Integer(i)),
            Err(_) => parse_locale_f64(trimmed)
                .filter(|f| f.fract() == 0.0)
                .map(|f| FieldValue::Integer(f as i64))
                .ok_or_else(|| {
                    ChargeError::validation(format!(
                        "Column '{}' expects an integer, got '{}'",
                        column.name, trimmed
                    ))
                }),
        },
        ColumnType::Timestamp => EventTime::parse(trimmed)
            .map(|t| FieldValue::Text(t.to_storage()))
            .map_err(|e| ChargeError::validation(format!("Column '{}': {}", column.name, e))),
    }
}
