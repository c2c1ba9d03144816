// src/table/mod.rs
pub mod columns;
pub mod convert;
pub mod infer;
pub mod load;

pub use columns::{
    cell_to_string, column_index, drop_columns, numeric_values, string_column,
    timestamp_column, with_column,
};
pub use convert::{raw_to_batch, MissingValues};
pub use load::load_raw_table;

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::path::Path;

use crate::config::Encoding;

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Column names exactly as they appear in the header row.
    pub headers: Vec<String>,
    /// Data rows, each padded to `headers.len()` fields.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Read a delimited file and type its columns in one go.
pub fn load_table<P: AsRef<Path>>(
    path: P,
    encoding: Encoding,
    missing: &MissingValues,
) -> Result<RecordBatch> {
    let raw = load_raw_table(path, encoding)?;
    raw_to_batch(&raw, missing)
}
