use arrow::array::{ArrayRef, Int64Array};
use std::{collections::HashMap, sync::Arc};

use super::FeatureDef;
use crate::error::CleanError;
use crate::table::{cell_to_string, column_index};

/// Number of rows sharing each row's value of `column`. Missing values are
/// counted together as one group.
pub fn group_counts(
    batch: &arrow::record_batch::RecordBatch,
    column: &str,
) -> Result<Vec<i64>, CleanError> {
    let array = batch.column(column_index(batch, column)?);
    let keys: Vec<Option<String>> = (0..batch.num_rows())
        .map(|row| cell_to_string(array.as_ref(), row))
        .collect();

    let mut counts: HashMap<&Option<String>, i64> = HashMap::new();
    for key in &keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    Ok(keys.iter().map(|k| counts[k]).collect())
}

fn volume(name: &str, column: &'static str) -> FeatureDef {
    FeatureDef::new(name, &[column], move |batch| {
        let counts = group_counts(batch, column)?;
        Ok(Arc::new(Int64Array::from(counts)) as ArrayRef)
    })
}

pub fn market_volume() -> FeatureDef {
    volume("market_volume", "market")
}

pub fn country_volume() -> FeatureDef {
    volume("country_volume", "order_country")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use proptest::prelude::*;

    fn markets(values: Vec<&str>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new("market", DataType::Utf8, true)]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(values)) as ArrayRef],
        )
        .unwrap()
    }

    #[test]
    fn test_counts_per_group() {
        let b = markets(vec!["LATAM", "Europe", "LATAM", "Pacific Asia", "LATAM"]);
        assert_eq!(group_counts(&b, "market").unwrap(), vec![3, 1, 3, 1, 3]);
    }

    proptest! {
        // Summing 1/volume over a group's rows gives exactly one per group.
        #[test]
        fn reciprocal_volumes_sum_to_group_count(
            picks in proptest::collection::vec(0usize..4, 1..200)
        ) {
            let names = ["LATAM", "Europe", "USCA", "Africa"];
            let values: Vec<&str> = picks.iter().map(|&i| names[i]).collect();
            let counts = group_counts(&markets(values.clone()), "market").unwrap();

            let total: f64 = counts.iter().map(|&c| 1.0 / c as f64).sum();
            let distinct = values.iter().collect::<std::collections::HashSet<_>>().len();
            prop_assert!((total - distinct as f64).abs() < 1e-9);
        }
    }
}
