//! Seeded, label-stratified train/test assignment.
//!
//! The assignment is computed once during cleaning and persisted as a column
//! so that imputation, label encoding and scaling can all be fit on the same
//! training rows.

use anyhow::{bail, Result};
use arrow::{
    array::{Array, ArrayRef, StringArray},
    record_batch::RecordBatch,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{info, warn};

use crate::config::SplitConfig;
use crate::table::{cell_to_string, string_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "train" => Some(Partition::Train),
            "test" => Some(Partition::Test),
            _ => None,
        }
    }
}

/// Assign each row to train or test so every stratum keeps its proportion.
/// Within a stratum, indices are shuffled with `ChaCha8Rng` seeded by `seed`
/// and the first `round(n * test_fraction)` become test rows.
pub fn stratified_split(strata: &[String], test_fraction: f64, seed: u64) -> Vec<Partition> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, key) in strata.iter().enumerate() {
        groups.entry(key.as_str()).or_default().push(i);
    }

    let fraction = test_fraction.clamp(0.0, 1.0);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = vec![Partition::Train; strata.len()];
    for indices in groups.values_mut() {
        indices.shuffle(&mut rng);
        let n_test = (indices.len() as f64 * fraction).round() as usize;
        for &i in indices.iter().take(n_test) {
            out[i] = Partition::Test;
        }
    }
    out
}

/// Split `batch` on its label column. Missing labels form their own stratum;
/// without a label column every row is a training row.
pub fn assign_partitions(batch: &RecordBatch, cfg: &SplitConfig) -> Vec<Partition> {
    let Ok(idx) = batch.schema().index_of(&cfg.label_column) else {
        warn!(label = %cfg.label_column, "label column absent, every row is a training row");
        return vec![Partition::Train; batch.num_rows()];
    };
    let labels = batch.column(idx);
    let strata: Vec<String> = (0..batch.num_rows())
        .map(|row| cell_to_string(labels.as_ref(), row).unwrap_or_else(|| "<missing>".to_string()))
        .collect();

    let parts = stratified_split(&strata, cfg.test_fraction, cfg.seed);
    let n_test = parts.iter().filter(|p| **p == Partition::Test).count();
    info!(
        train = parts.len() - n_test,
        test = n_test,
        seed = cfg.seed,
        "assigned partitions"
    );
    parts
}

pub fn partition_array(parts: &[Partition]) -> ArrayRef {
    Arc::new(parts.iter().map(|p| Some(p.as_str())).collect::<StringArray>())
}

/// Read a persisted partition column back. `Ok(None)` when absent.
pub fn read_partitions(batch: &RecordBatch, column: &str) -> Result<Option<Vec<Partition>>> {
    if batch.schema().index_of(column).is_err() {
        return Ok(None);
    }
    let values = string_column(batch, column)?;
    let mut parts = Vec::with_capacity(values.len());
    for (row, v) in values.iter().enumerate() {
        match v.and_then(Partition::from_str) {
            Some(p) => parts.push(p),
            None => bail!("row {}: invalid {} value {:?}", row, column, v),
        }
    }
    Ok(Some(parts))
}

pub fn training_mask(parts: &[Partition]) -> Vec<bool> {
    parts.iter().map(|p| *p == Partition::Train).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    fn labels(zeros: usize, ones: usize) -> Vec<String> {
        let mut v = vec!["0".to_string(); zeros];
        v.extend(vec!["1".to_string(); ones]);
        v
    }

    #[test]
    fn test_split_keeps_class_proportions() {
        let strata = labels(60, 40);
        let parts = stratified_split(&strata, 0.2, 42);
        let test_zero = (0..60).filter(|&i| parts[i] == Partition::Test).count();
        let test_one = (60..100).filter(|&i| parts[i] == Partition::Test).count();
        assert_eq!(test_zero, 12);
        assert_eq!(test_one, 8);
    }

    #[test]
    fn test_split_is_deterministic() {
        let strata = labels(30, 30);
        assert_eq!(
            stratified_split(&strata, 0.2, 7),
            stratified_split(&strata, 0.2, 7)
        );
    }

    #[test]
    fn test_zero_fraction_is_all_train() {
        let parts = stratified_split(&labels(5, 5), 0.0, 42);
        assert!(parts.iter().all(|p| *p == Partition::Train));
    }

    #[test]
    fn test_missing_label_column_is_all_train() {
        let schema = Schema::new(vec![Field::new("sales", DataType::Int64, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef],
        )
        .unwrap();
        let parts = assign_partitions(&batch, &SplitConfig::default());
        assert_eq!(parts, vec![Partition::Train; 3]);
    }

    #[test]
    fn test_partition_column_round_trip() -> Result<()> {
        let parts = vec![Partition::Train, Partition::Test, Partition::Train];
        let schema = Schema::new(vec![Field::new("dataset_split", DataType::Utf8, true)]);
        let batch = RecordBatch::try_new(Arc::new(schema), vec![partition_array(&parts)])?;
        assert_eq!(read_partitions(&batch, "dataset_split")?, Some(parts));
        assert_eq!(read_partitions(&batch, "other")?, None);
        Ok(())
    }
}
