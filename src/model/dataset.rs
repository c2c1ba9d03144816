//! Feature matrix assembly: selection, label encoding, scaling and the
//! train/test split.

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::config::{ModelingConfig, SplitConfig};
use crate::error::ModelError;
use crate::partition::{assign_partitions, read_partitions, Partition};
use crate::stats::mean_std;
use crate::table::{cell_to_string, column_index, numeric_values};

/// Maps category strings to integer codes in sorted order of the values
/// seen during fitting. Unseen values get the reserved code `n_classes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, value: &str) -> usize {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .unwrap_or(self.classes.len())
    }
}

/// Column-wise standardization with population standard deviation. A
/// constant column is scaled by 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut means = Vec::with_capacity(width);
        let mut stds = Vec::with_capacity(width);
        for j in 0..width {
            let col: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            let (m, s) = mean_std(&col).unwrap_or((0.0, 1.0));
            means.push(m);
            stds.push(if s > 0.0 { s } else { 1.0 });
        }
        Self { means, stds }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|r| {
                r.iter()
                    .zip(self.means.iter().zip(&self.stds))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect()
    }
}

/// Encoded feature rows plus everything needed to report on them.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    /// Encoded, unscaled features, one row per record.
    pub features: Vec<Vec<f64>>,
    /// Feature values as they appear in the table, for prediction output.
    pub raw: Vec<Vec<String>>,
    pub labels: Vec<i32>,
    pub partitions: Vec<Partition>,
    pub encoders: Vec<(String, LabelEncoder)>,
}

impl Dataset {
    pub fn indices(&self, part: Partition) -> Vec<usize> {
        self.partitions
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == part)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn rows(&self, idx: &[usize]) -> Vec<Vec<f64>> {
        idx.iter().map(|&i| self.features[i].clone()).collect()
    }

    pub fn labels_at(&self, idx: &[usize]) -> Vec<i32> {
        idx.iter().map(|&i| self.labels[i]).collect()
    }
}

fn read_labels(batch: &RecordBatch, column: &str) -> Result<Vec<i32>> {
    let col = batch.column(column_index(batch, column)?);
    let mut labels = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let text = cell_to_string(col.as_ref(), row);
        match text.as_deref().and_then(|t| t.parse::<f64>().ok()) {
            Some(v) if v == 0.0 || v == 1.0 => labels.push(v as i32),
            _ => {
                return Err(ModelError::InvalidLabel {
                    row,
                    value: text.unwrap_or_default(),
                }
                .into())
            }
        }
    }
    Ok(labels)
}

/// Select the configured features and target, reuse (or compute) the
/// partition, and encode categoricals with encoders fit on training rows.
pub fn build_dataset(
    batch: &RecordBatch,
    modeling: &ModelingConfig,
    split: &SplitConfig,
) -> Result<Dataset> {
    let n = batch.num_rows();
    let labels = read_labels(batch, &split.label_column)?;
    let partitions = match read_partitions(batch, &split.split_column)? {
        Some(p) => p,
        None => {
            warn!(column = %split.split_column, "no persisted partition, splitting now");
            assign_partitions(batch, split)
        }
    };
    let train: Vec<bool> = partitions.iter().map(|p| *p == Partition::Train).collect();

    let mut feature_names = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    let mut raw_columns: Vec<Vec<String>> = Vec::new();
    let mut encoders = Vec::new();

    for name in &modeling.numeric_features {
        let values = numeric_values(batch, name)?;
        if let Some(row) = values.iter().position(Option::is_none) {
            return Err(ModelError::MissingValue {
                feature: name.clone(),
                row,
            }
            .into());
        }
        let col = batch.column(column_index(batch, name)?);
        raw_columns.push(
            (0..n)
                .map(|row| cell_to_string(col.as_ref(), row).unwrap_or_default())
                .collect(),
        );
        columns.push(values.into_iter().flatten().collect());
        feature_names.push(name.clone());
    }

    for name in &modeling.categorical_features {
        let col = batch.column(column_index(batch, name)?);
        let text: Vec<String> = (0..n)
            .map(|row| cell_to_string(col.as_ref(), row).unwrap_or_default())
            .collect();
        let encoder = LabelEncoder::fit(
            text.iter()
                .zip(&train)
                .filter(|(_, t)| **t)
                .map(|(v, _)| v.as_str()),
        );
        columns.push(text.iter().map(|v| encoder.encode(v) as f64).collect());
        raw_columns.push(text);
        feature_names.push(name.clone());
        encoders.push((name.clone(), encoder));
    }

    let features: Vec<Vec<f64>> = (0..n)
        .map(|row| columns.iter().map(|c| c[row]).collect())
        .collect();
    let raw: Vec<Vec<String>> = (0..n)
        .map(|row| raw_columns.iter().map(|c| c[row].clone()).collect())
        .collect();

    let n_train = train.iter().filter(|t| **t).count();
    info!(
        rows = n,
        features = feature_names.len(),
        train = n_train,
        test = n - n_train,
        "dataset assembled"
    );

    Ok(Dataset {
        feature_names,
        features,
        raw,
        labels,
        partitions,
        encoders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_array;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(split: Option<Vec<Partition>>) -> RecordBatch {
        let mut fields = vec![
            Field::new("sales", DataType::Float64, true),
            Field::new("market", DataType::Utf8, true),
            Field::new("late_delivery_risk", DataType::Int64, true),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(vec![10.0, 20.0, 30.0, 40.0])),
            Arc::new(StringArray::from(vec!["LATAM", "Europe", "LATAM", "Africa"])),
            Arc::new(Int64Array::from(vec![1, 0, 1, 0])),
        ];
        if let Some(parts) = split {
            fields.push(Field::new("dataset_split", DataType::Utf8, true));
            columns.push(partition_array(&parts));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    fn modeling() -> ModelingConfig {
        ModelingConfig {
            numeric_features: vec!["sales".to_string()],
            categorical_features: vec!["market".to_string()],
            ..ModelingConfig::default()
        }
    }

    #[test]
    fn test_encoder_sorted_codes_and_unseen_value() {
        let enc = LabelEncoder::fit(["LATAM", "Europe", "LATAM"]);
        assert_eq!(enc.n_classes(), 2);
        assert_eq!(enc.encode("Europe"), 0);
        assert_eq!(enc.encode("LATAM"), 1);
        assert_eq!(enc.encode("Africa"), 2);
    }

    #[test]
    fn test_scaler_fit_on_given_rows_only() {
        let scaler = StandardScaler::fit(&[vec![1.0, 5.0], vec![3.0, 5.0]]);
        let out = scaler.transform(&[vec![2.0, 5.0], vec![5.0, 6.0]]);
        assert_eq!(out[0], vec![0.0, 0.0]);
        // mean 2, std 1; the constant column keeps unit scale
        assert_eq!(out[1], vec![3.0, 1.0]);
    }

    #[test]
    fn test_persisted_split_is_reused() -> Result<()> {
        use Partition::{Test, Train};
        let parts = vec![Train, Train, Test, Test];
        let data = build_dataset(&batch(Some(parts.clone())), &modeling(), &SplitConfig::default())?;

        assert_eq!(data.partitions, parts);
        assert_eq!(data.feature_names, vec!["sales", "market"]);
        assert_eq!(data.labels, vec![1, 0, 1, 0]);
        // encoder saw only LATAM and Europe; Africa sits in the test rows
        assert_eq!(data.features[3], vec![40.0, 2.0]);
        assert_eq!(data.raw[3], vec!["40".to_string(), "Africa".to_string()]);
        Ok(())
    }

    #[test]
    fn test_split_computed_when_absent() -> Result<()> {
        let data = build_dataset(&batch(None), &modeling(), &SplitConfig::default())?;
        assert_eq!(data.partitions.len(), 4);
        Ok(())
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let schema = Schema::new(vec![Field::new("late_delivery_risk", DataType::Int64, true)]);
        let b = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int64Array::from(vec![0, 2])) as ArrayRef],
        )
        .unwrap();
        let cfg = ModelingConfig {
            numeric_features: vec![],
            categorical_features: vec![],
            ..ModelingConfig::default()
        };
        let err = build_dataset(&b, &cfg, &SplitConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::InvalidLabel { row: 1, .. })
        ));
    }
}
