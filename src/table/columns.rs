//! Lookup and rebuild helpers shared by the cleaning, feature and modeling
//! stages. Lookups fail with [`CleanError`] so callers can report which
//! column was missing or mistyped.

use arrow::{
    array::{
        Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
    },
    datatypes::{DataType, Field, Schema, TimeUnit},
    error::ArrowError,
    record_batch::RecordBatch,
    util::display::array_value_to_string,
};
use chrono::DateTime;
use std::sync::Arc;

use crate::error::CleanError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn column_index(batch: &RecordBatch, name: &str) -> Result<usize, CleanError> {
    batch
        .schema()
        .index_of(name)
        .map_err(|_| CleanError::MissingColumn {
            column: name.to_string(),
        })
}

fn type_error(batch: &RecordBatch, idx: usize, expected: &'static str) -> CleanError {
    let schema = batch.schema();
    let field = schema.field(idx);
    CleanError::ColumnType {
        column: field.name().clone(),
        expected,
        found: field.data_type().to_string(),
    }
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, CleanError> {
    let idx = column_index(batch, name)?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| type_error(batch, idx, "Utf8"))
}

pub fn timestamp_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a TimestampMillisecondArray, CleanError> {
    let idx = column_index(batch, name)?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .ok_or_else(|| type_error(batch, idx, "Timestamp(Millisecond)"))
}

/// Values of an `Int64` or `Float64` column widened to `f64`.
pub fn numeric_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>, CleanError> {
    let idx = column_index(batch, name)?;
    let col = batch.column(idx);
    if let Some(a) = col.as_any().downcast_ref::<Float64Array>() {
        return Ok(a.iter().collect());
    }
    if let Some(a) = col.as_any().downcast_ref::<Int64Array>() {
        return Ok(a.iter().map(|v| v.map(|v| v as f64)).collect());
    }
    Err(type_error(batch, idx, "Int64 or Float64"))
}

/// Render a single cell as text; `None` for nulls.
pub fn cell_to_string(array: &dyn Array, row: usize) -> Option<String> {
    if array.is_null(row) {
        return None;
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Some(a.value(row).to_string());
    }
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Some(a.value(row).to_string());
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Some(a.value(row).to_string());
    }
    if let Some(a) = any.downcast_ref::<TimestampMillisecondArray>() {
        return DateTime::from_timestamp_millis(a.value(row))
            .map(|dt| dt.naive_utc().format(TIMESTAMP_FORMAT).to_string());
    }
    array_value_to_string(array, row).ok()
}

/// Append `array` as `name`, or replace the column in place if it exists.
pub fn with_column(
    batch: &RecordBatch,
    name: &str,
    array: ArrayRef,
) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let field = Field::new(name, array.data_type().clone(), true);
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    match schema.index_of(name) {
        Ok(idx) => {
            fields[idx] = field;
            columns[idx] = array;
        }
        Err(_) => {
            fields.push(field);
            columns.push(array);
        }
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
}

/// Remove every listed column that exists; returns the batch and the names
/// actually removed.
pub fn drop_columns(
    batch: &RecordBatch,
    names: &[String],
) -> Result<(RecordBatch, Vec<String>), ArrowError> {
    let schema = batch.schema();
    let mut keep = Vec::with_capacity(schema.fields().len());
    let mut dropped = Vec::new();
    for (i, field) in schema.fields().iter().enumerate() {
        if names.iter().any(|n| n == field.name()) {
            dropped.push(field.name().clone());
        } else {
            keep.push(i);
        }
    }
    Ok((batch.project(&keep)?, dropped))
}

pub fn is_timestamp(dt: &DataType) -> bool {
    matches!(dt, DataType::Timestamp(TimeUnit::Millisecond, _))
}
