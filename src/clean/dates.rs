use arrow::{
    array::{Array, ArrayRef, TimestampMillisecondArray},
    record_batch::RecordBatch,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::debug;

use crate::error::CleanError;
use crate::table::{columns::is_timestamp, string_column, with_column};

/// Ordered list of chrono formats; the first that matches wins.
#[derive(Debug, Clone)]
pub struct DateParser {
    formats: Vec<String>,
}

impl DateParser {
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    /// Parse to milliseconds since the epoch, reading the value as naive
    /// wall-clock time. Date-only formats land on midnight.
    pub fn parse_millis(&self, s: &str) -> Option<i64> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        for fmt in &self.formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.and_utc().timestamp_millis());
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
            }
        }
        None
    }
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(crate::config::CleaningConfig::default().date_formats)
    }
}

/// Replace a text column with a millisecond timestamp column.
///
/// Any missing or unparseable cell is fatal: every temporal feature
/// downstream depends on it. A column that is already a timestamp is
/// returned unchanged.
pub fn parse_date_column(
    batch: &RecordBatch,
    column: &str,
    parser: &DateParser,
) -> Result<RecordBatch, anyhow::Error> {
    let idx = crate::table::column_index(batch, column)?;
    if is_timestamp(batch.schema().field(idx).data_type()) {
        return Ok(batch.clone());
    }

    let text = string_column(batch, column)?;
    let mut millis = Vec::with_capacity(text.len());
    for (row, value) in text.iter().enumerate() {
        let parsed = value.and_then(|v| parser.parse_millis(v));
        match parsed {
            Some(ms) => millis.push(ms),
            None => {
                return Err(CleanError::DateParse {
                    column: column.to_string(),
                    row,
                    value: value.unwrap_or_default().to_string(),
                }
                .into())
            }
        }
    }
    debug!(column, rows = millis.len(), "parsed date column");

    let array: ArrayRef = Arc::new(TimestampMillisecondArray::from(millis));
    Ok(with_column(batch, column, array)?)
}
