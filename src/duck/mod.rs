//! Bulk load of the processed table into DuckDB.
//!
//! The target table is replaced on every run: dropped if present, recreated
//! from the batch schema, then filled through the appender in fixed-size
//! chunks.

use anyhow::{bail, Context, Result};
use arrow::{
    array::{Array, Float64Array, Int64Array, StringArray, TimestampMillisecondArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use duckdb::{
    appender_params_from_iter,
    types::{TimeUnit, Value},
    Connection,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::table::{cell_to_string, columns::is_timestamp};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("identifier regex must compile"));

/// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
pub fn open_disk_db(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Connection::open(path).with_context(|| format!("opening DuckDB file {}", path.display()))
}

pub fn open_mem_db() -> Result<Connection> {
    Ok(Connection::open_in_memory()?)
}

fn check_identifier(name: &str) -> Result<()> {
    if !IDENTIFIER_RE.is_match(name) {
        bail!("`{}` is not a valid SQL identifier", name);
    }
    Ok(())
}

fn sql_type(dt: &DataType) -> &'static str {
    match dt {
        DataType::Int64 => "BIGINT",
        DataType::Float64 => "DOUBLE",
        dt if is_timestamp(dt) => "TIMESTAMP",
        _ => "VARCHAR",
    }
}

/// `DROP TABLE IF EXISTS` then `CREATE TABLE` with columns typed from `batch`.
pub fn replace_table(conn: &Connection, table: &str, batch: &RecordBatch) -> Result<()> {
    check_identifier(table)?;
    let schema = batch.schema();
    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        check_identifier(field.name())?;
        columns.push(format!("\"{}\" {}", field.name(), sql_type(field.data_type())));
    }
    let sql = format!(
        "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table}(\n    {}\n);",
        columns.join(",\n    ")
    );
    debug!(%sql, "replacing table");
    conn.execute_batch(&sql)
        .with_context(|| format!("creating table {}", table))?;
    Ok(())
}

fn cell_value(array: &dyn Array, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Value::BigInt(a.value(row));
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Value::Double(a.value(row));
    }
    if let Some(a) = any.downcast_ref::<TimestampMillisecondArray>() {
        return Value::Timestamp(TimeUnit::Millisecond, a.value(row));
    }
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Value::Text(a.value(row).to_string());
    }
    cell_to_string(array, row).map_or(Value::Null, Value::Text)
}

/// Append every row of `batch` into `table`, flushing after each chunk of
/// `batch_size` rows. Returns the number of rows appended.
pub fn insert_batch_rows(
    conn: &Connection,
    table: &str,
    batch: &RecordBatch,
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut written = 0;

    while written < batch.num_rows() {
        let end = (written + batch_size).min(batch.num_rows());
        let mut appender = conn
            .appender(table)
            .with_context(|| format!("opening appender on {}", table))?;
        for row in written..end {
            let values = batch.columns().iter().map(|c| cell_value(c.as_ref(), row));
            appender.append_row(appender_params_from_iter(values))?;
        }
        appender.flush()?;
        debug!(from = written, to = end, "flushed chunk");
        written = end;
    }
    Ok(written)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub rows: i64,
    /// `ROUND(AVG(delay_days), 2)`, when the column exists.
    pub avg_delay_days: Option<f64>,
}

/// Row count and average delay read back from the loaded table.
pub fn verify(conn: &Connection, table: &str, batch: &RecordBatch) -> Result<LoadSummary> {
    check_identifier(table)?;
    let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |r| r.get(0))?;
    let avg_delay_days = if batch.schema().index_of("delay_days").is_ok() {
        conn.query_row(
            &format!("SELECT ROUND(AVG(delay_days), 2) FROM {table};"),
            [],
            |r| r.get::<_, Option<f64>>(0),
        )?
    } else {
        None
    };
    Ok(LoadSummary {
        rows,
        avg_delay_days,
    })
}

/// Replace `table` with the contents of `batch` and check the row count.
#[instrument(level = "info", skip(conn, batch), fields(rows = batch.num_rows()))]
pub fn load_table(
    conn: &Connection,
    table: &str,
    batch: &RecordBatch,
    batch_size: usize,
) -> Result<LoadSummary> {
    replace_table(conn, table, batch)?;
    let appended = insert_batch_rows(conn, table, batch, batch_size)?;
    let summary = verify(conn, table, batch)?;
    if summary.rows != appended as i64 {
        bail!(
            "table {} holds {} rows after loading {}",
            table,
            summary.rows,
            appended
        );
    }
    info!(
        table,
        rows = summary.rows,
        avg_delay_days = ?summary.avg_delay_days,
        "database load verified"
    );
    Ok(summary)
}
