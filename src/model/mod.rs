//! Late-delivery classifiers trained on the processed table.

pub mod classifiers;
pub mod dataset;
pub mod importance;
pub mod metrics;
pub mod report;

pub use classifiers::{Classifier, ForestModel, LogisticModel};
pub use dataset::{build_dataset, Dataset, LabelEncoder, StandardScaler};
pub use metrics::{ClassificationMetrics, ConfusionMatrix};
pub use report::{MetricsReport, ModelReport};

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::error::ModelError;
use crate::partition::Partition;
use importance::{coefficient_importance, permutation_importance, FeatureImportance};
use report::{write_metrics, write_predictions, Predictions};

fn evaluate(
    model: &dyn Classifier,
    data: &Dataset,
    test_idx: &[usize],
    importance: Vec<FeatureImportance>,
    cfg: &PipelineConfig,
) -> Result<ModelReport> {
    let rows = data.rows(test_idx);
    let actual = data.labels_at(test_idx);
    let predicted = model.predict(&rows)?;
    let probability = model.predict_proba(&rows)?;
    let metrics = ClassificationMetrics::calculate(&actual, &predicted, &probability);
    info!(
        model = model.name(),
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1 = metrics.f1,
        roc_auc = ?metrics.roc_auc,
        "model evaluated"
    );

    write_predictions(
        &cfg.paths.predictions_dir,
        &Predictions {
            model: model.name(),
            feature_names: &data.feature_names,
            raw: test_idx.iter().map(|&i| data.raw[i].as_slice()).collect(),
            actual: &actual,
            predicted: &predicted,
            probability: &probability,
        },
    )?;

    Ok(ModelReport {
        model: model.name().to_string(),
        metrics,
        feature_importance: importance,
    })
}

/// Fit both classifiers on the training partition, evaluate them on the
/// test partition and write the metrics report and prediction files.
#[instrument(level = "info", skip_all, fields(rows = batch.num_rows()))]
pub fn run_modeling(batch: &RecordBatch, cfg: &PipelineConfig) -> Result<MetricsReport> {
    let data = build_dataset(batch, &cfg.modeling, &cfg.split)?;
    let train_idx = data.indices(Partition::Train);
    let test_idx = data.indices(Partition::Test);
    if train_idx.is_empty() {
        return Err(ModelError::EmptyPartition { partition: "train" }.into());
    }
    if test_idx.is_empty() {
        return Err(ModelError::EmptyPartition { partition: "test" }.into());
    }

    let x_train = data.rows(&train_idx);
    let y_train = data.labels_at(&train_idx);
    if y_train.iter().all(|y| *y == y_train[0]) {
        return Err(ModelError::SingleClass { class: y_train[0] }.into());
    }

    let mut models = Vec::with_capacity(2);

    let logistic = LogisticModel::fit(&x_train, &y_train, &cfg.modeling)?;
    let weights = coefficient_importance(&data.feature_names, logistic.coefficients());
    models.push(evaluate(&logistic, &data, &test_idx, weights, cfg)?);

    let forest = ForestModel::fit(&x_train, &y_train, &cfg.modeling, cfg.split.seed)?;
    let permuted = permutation_importance(
        &forest,
        &data.rows(&test_idx),
        &data.labels_at(&test_idx),
        &data.feature_names,
        cfg.split.seed,
    )?;
    models.push(evaluate(&forest, &data, &test_idx, permuted, cfg)?);

    let report = MetricsReport {
        generated_at: Utc::now().to_rfc3339(),
        seed: cfg.split.seed,
        balanced_classes: cfg.modeling.balance_classes,
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        features: data.feature_names.clone(),
        models,
    };
    write_metrics(&report, &cfg.paths.metrics_report)?;
    Ok(report)
}
