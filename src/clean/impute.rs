//! Missing-value imputation with an explicit fit/transform split.
//!
//! Statistics are fit on the training rows only and then applied unchanged
//! to every row, so the test partition never influences a fill value.

use anyhow::Result;
use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::stats::median;
use crate::table::{numeric_values, with_column};

#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    Numeric(f64),
    Text(String),
}

/// Per-column fill values learned by [`Imputer::fit`].
#[derive(Debug, Clone, Default)]
pub struct ImputationStats {
    pub fills: Vec<(String, FillValue)>,
}

impl ImputationStats {
    pub fn get(&self, column: &str) -> Option<&FillValue> {
        self.fills
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
pub struct Imputer {
    sentinel: String,
    exclude: Vec<String>,
}

impl Imputer {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            exclude: Vec::new(),
        }
    }

    /// Columns never imputed (the partition column, for instance).
    pub fn excluding(mut self, columns: &[String]) -> Self {
        self.exclude.extend(columns.iter().cloned());
        self
    }

    /// Learn fill values. `train` flags the rows that may contribute;
    /// numeric columns use the median of present training values, falling
    /// back to all present values and then to `0.0`.
    pub fn fit(&self, batch: &RecordBatch, train: &[bool]) -> Result<ImputationStats> {
        let schema = batch.schema();
        let mut fills = Vec::new();

        for field in schema.fields() {
            let name = field.name();
            if self.exclude.contains(name) {
                continue;
            }
            match field.data_type() {
                DataType::Int64 | DataType::Float64 => {
                    let values = numeric_values(batch, name)?;
                    let train_values: Vec<f64> = values
                        .iter()
                        .zip(train)
                        .filter_map(|(v, &t)| if t { *v } else { None })
                        .collect();
                    let fill = match median(&train_values) {
                        Some(m) => m,
                        None => {
                            let all: Vec<f64> = values.iter().flatten().copied().collect();
                            median(&all).unwrap_or(0.0)
                        }
                    };
                    fills.push((name.clone(), FillValue::Numeric(fill)));
                }
                DataType::Utf8 => {
                    fills.push((name.clone(), FillValue::Text(self.sentinel.clone())));
                }
                _ => {}
            }
        }

        Ok(ImputationStats { fills })
    }

    /// Fill nulls using previously fit statistics. Columns without nulls are
    /// left untouched; an `Int64` column whose fill is fractional is widened
    /// to `Float64`.
    pub fn transform(&self, batch: &RecordBatch, stats: &ImputationStats) -> Result<RecordBatch> {
        let mut out = batch.clone();
        let mut filled_columns = 0usize;

        for (name, fill) in &stats.fills {
            let Ok(idx) = out.schema().index_of(name) else {
                continue;
            };
            let col = out.column(idx).clone();
            let missing = col.null_count();
            if missing == 0 {
                continue;
            }

            let replacement = fill_array(col.as_ref(), fill);
            if let Some(array) = replacement {
                debug!(column = %name, missing, fill = ?fill, "imputed");
                out = with_column(&out, name, array)?;
                filled_columns += 1;
            }
        }

        info!(columns = filled_columns, "imputation applied");
        Ok(out)
    }
}

fn fill_array(col: &dyn Array, fill: &FillValue) -> Option<ArrayRef> {
    let any = col.as_any();
    match fill {
        FillValue::Numeric(m) => {
            if let Some(a) = any.downcast_ref::<Float64Array>() {
                let filled: Float64Array = a.iter().map(|v| Some(v.unwrap_or(*m))).collect();
                return Some(Arc::new(filled));
            }
            if let Some(a) = any.downcast_ref::<Int64Array>() {
                if m.fract() == 0.0 {
                    let fill = *m as i64;
                    let filled: Int64Array = a.iter().map(|v| Some(v.unwrap_or(fill))).collect();
                    return Some(Arc::new(filled));
                }
                let filled: Float64Array = a
                    .iter()
                    .map(|v| Some(v.map(|v| v as f64).unwrap_or(*m)))
                    .collect();
                return Some(Arc::new(filled));
            }
            None
        }
        FillValue::Text(s) => {
            let a = any.downcast_ref::<StringArray>()?;
            let filled: StringArray = a.iter().map(|v| Some(v.unwrap_or(s.as_str()))).collect();
            Some(Arc::new(filled))
        }
    }
}
