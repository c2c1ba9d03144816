use arrow::array::{ArrayRef, Int64Array, StringArray};
use chrono::{DateTime, Datelike, NaiveDateTime};
use std::sync::Arc;

use super::FeatureDef;
use crate::error::CleanError;
use crate::table::timestamp_column;

fn map_dates<T>(
    batch: &arrow::record_batch::RecordBatch,
    column: &str,
    f: impl Fn(NaiveDateTime) -> T,
) -> Result<Vec<Option<T>>, CleanError> {
    let ts = timestamp_column(batch, column)?;
    Ok(ts
        .iter()
        .map(|ms| {
            ms.and_then(DateTime::from_timestamp_millis)
                .map(|dt| f(dt.naive_utc()))
        })
        .collect())
}

fn int_feature(name: &str, column: &str, f: fn(NaiveDateTime) -> i64) -> FeatureDef {
    let input = column.to_string();
    FeatureDef::new(name, &[column], move |batch| {
        let values = map_dates(batch, &input, f)?;
        Ok(Arc::new(Int64Array::from(values)) as ArrayRef)
    })
}

pub fn order_year(column: &str) -> FeatureDef {
    int_feature("order_year", column, |dt| dt.year() as i64)
}

pub fn order_month(column: &str) -> FeatureDef {
    int_feature("order_month", column, |dt| dt.month() as i64)
}

pub fn order_quarter(column: &str) -> FeatureDef {
    int_feature("order_quarter", column, |dt| ((dt.month() - 1) / 3 + 1) as i64)
}

/// English weekday name, `"Monday"` through `"Sunday"`.
pub fn order_day(column: &str) -> FeatureDef {
    let input = column.to_string();
    FeatureDef::new("order_day", &[column], move |batch| {
        let values = map_dates(batch, &input, |dt| dt.format("%A").to_string())?;
        Ok(Arc::new(StringArray::from(values)) as ArrayRef)
    })
}
