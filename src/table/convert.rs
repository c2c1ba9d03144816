use anyhow::Result;
use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

use super::{infer::infer_column_type, RawTable};

/// Cell spellings that mean "no value".
#[derive(Debug, Clone)]
pub struct MissingValues {
    tokens: HashSet<String>,
}

impl MissingValues {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens: HashSet<String> = tokens.into_iter().map(Into::into).collect();
        tokens.insert(String::new());
        Self { tokens }
    }

    pub fn is_missing(&self, cell: &str) -> bool {
        self.tokens.contains(cell)
    }
}

impl Default for MissingValues {
    fn default() -> Self {
        Self::new(crate::config::CleaningConfig::default().missing_tokens)
    }
}

/// Convert string cells into typed Arrow columns.
pub fn raw_to_batch(raw: &RawTable, missing: &MissingValues) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(raw.headers.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(raw.headers.len());

    for (i, name) in raw.headers.iter().enumerate() {
        let cells = || {
            raw.rows.iter().map(move |row| {
                let v = row[i].as_str();
                if missing.is_missing(v) {
                    None
                } else {
                    Some(v)
                }
            })
        };

        let ty = infer_column_type(cells());
        let array: ArrayRef = match ty {
            DataType::Int64 => Arc::new(
                cells()
                    .map(|c| c.and_then(|s| s.trim().parse::<i64>().ok()))
                    .collect::<Int64Array>(),
            ),
            DataType::Float64 => Arc::new(
                cells()
                    .map(|c| c.and_then(|s| s.trim().parse::<f64>().ok()))
                    .collect::<Float64Array>(),
            ),
            _ => Arc::new(cells().collect::<StringArray>()),
        };
        debug!(column = %name, ty = ?ty, nulls = array.null_count(), "typed column");
        fields.push(Field::new(name, ty, true));
        columns.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_typed_columns_and_nulls() -> Result<()> {
        let table = raw(
            &["Order Item Quantity", "Sales", "Market"],
            &[&["1", "10.5", "LATAM"], &["2", "", "NaN"], &["3", "7", "Europe"]],
        );
        let batch = raw_to_batch(&table, &MissingValues::default())?;

        assert_eq!(batch.num_rows(), 3);
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(schema.field(2).data_type(), &DataType::Utf8);
        assert_eq!(batch.column(1).null_count(), 1);
        assert_eq!(batch.column(2).null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_custom_tokens() {
        let m = MissingValues::new(["?"]);
        assert!(m.is_missing("?"));
        assert!(m.is_missing(""));
        assert!(!m.is_missing("NA"));
    }
}
