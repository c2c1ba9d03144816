use arrow::array::{ArrayRef, Int64Array};
use std::sync::Arc;
use tracing::debug;

use super::FeatureDef;
use crate::stats::percentile;
use crate::table::{cell_to_string, column_index, numeric_values, string_column};

/// 1 for Saturday and Sunday orders. Reads the weekday name from `order_day`.
pub fn is_weekend() -> FeatureDef {
    FeatureDef::new("is_weekend", &["order_day"], |batch| {
        let days = string_column(batch, "order_day")?;
        let flags: Int64Array = days
            .iter()
            .map(|d| d.map(|d| matches!(d, "Saturday" | "Sunday") as i64))
            .collect();
        Ok(Arc::new(flags) as ArrayRef)
    })
}

/// 1 when the item quantity reaches the `q`-th percentile of all quantities.
/// The threshold is computed over the whole table so that every row is
/// judged against the same cut-off.
pub fn is_bulk_order(q: f64) -> FeatureDef {
    FeatureDef::new("is_bulk_order", &["order_item_quantity"], move |batch| {
        let qty = numeric_values(batch, "order_item_quantity")?;
        let present: Vec<f64> = qty.iter().flatten().copied().collect();
        let threshold = percentile(&present, q);
        debug!(?threshold, q, "bulk order threshold");

        let flags: Int64Array = qty
            .iter()
            .map(|v| match (v, threshold) {
                (Some(v), Some(t)) => Some((*v >= t) as i64),
                (None, _) => None,
                (Some(_), None) => Some(0),
            })
            .collect();
        Ok(Arc::new(flags) as ArrayRef)
    })
}

/// 1 when the order ships to a country other than the customer's.
pub fn is_international() -> FeatureDef {
    FeatureDef::new(
        "is_international",
        &["order_country", "customer_country"],
        |batch| {
            let order = batch.column(column_index(batch, "order_country")?);
            let customer = batch.column(column_index(batch, "customer_country")?);
            let flags: Int64Array = (0..batch.num_rows())
                .map(|row| {
                    let a = cell_to_string(order.as_ref(), row);
                    let b = cell_to_string(customer.as_ref(), row);
                    Some((a != b) as i64)
                })
                .collect();
            Ok(Arc::new(flags) as ArrayRef)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    fn single(name: &str, array: ArrayRef) -> RecordBatch {
        let schema = Schema::new(vec![Field::new(name, array.data_type().clone(), true)]);
        RecordBatch::try_new(Arc::new(schema), vec![array]).unwrap()
    }

    fn flags(out: ArrayRef) -> Vec<i64> {
        out.as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .values()
            .to_vec()
    }

    #[test]
    fn test_bulk_threshold_is_interpolated_percentile() {
        let qty: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4, 10, 100]));
        let b = single("order_item_quantity", qty);
        let out = (is_bulk_order(75.0).compute)(&b).unwrap();
        // threshold 8.5
        assert_eq!(flags(out), vec![0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_weekend_by_name() {
        let days: ArrayRef = Arc::new(StringArray::from(vec![
            "Monday", "Friday", "Saturday", "Sunday",
        ]));
        let out = (is_weekend().compute)(&single("order_day", days)).unwrap();
        assert_eq!(flags(out), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_international() {
        let schema = Schema::new(vec![
            Field::new("order_country", DataType::Utf8, true),
            Field::new("customer_country", DataType::Utf8, true),
        ]);
        let b = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["Mexico", "Francia"])) as ArrayRef,
                Arc::new(StringArray::from(vec!["Mexico", "EE. UU."])) as ArrayRef,
            ],
        )
        .unwrap();
        let out = (is_international().compute)(&b).unwrap();
        assert_eq!(flags(out), vec![0, 1]);
    }
}
