use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;

use super::importance::FeatureImportance;
use super::metrics::ClassificationMetrics;
use crate::persist::{commit, staging_file};

#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub model: String,
    pub metrics: ClassificationMetrics,
    pub feature_importance: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub generated_at: String,
    pub seed: u64,
    /// Whether training used class-balanced samples.
    pub balanced_classes: bool,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: Vec<String>,
    pub models: Vec<ModelReport>,
}

pub fn write_metrics(report: &MetricsReport, path: &Path) -> Result<()> {
    let tmp = staging_file(path)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut w, report).context("serializing metrics report")?;
        w.write_all(b"\n")?;
        w.flush()?;
    }
    commit(tmp, path)?;
    info!(path = %path.display(), models = report.models.len(), "wrote metrics report");
    Ok(())
}

/// Test-partition predictions for one model.
pub struct Predictions<'a> {
    pub model: &'a str,
    pub feature_names: &'a [String],
    pub raw: Vec<&'a [String]>,
    pub actual: &'a [i32],
    pub predicted: &'a [i32],
    pub probability: &'a [f64],
}

pub fn predictions_path(dir: &Path, model: &str) -> PathBuf {
    dir.join(format!("predictions_{}.csv", model))
}

/// Feature values as loaded, then `actual`, `predicted`, `probability`.
pub fn write_predictions(dir: &Path, p: &Predictions<'_>) -> Result<PathBuf> {
    let path = predictions_path(dir, p.model);
    let tmp = staging_file(&path)?;
    {
        let mut w = csv::Writer::from_writer(BufWriter::new(tmp.as_file()));
        let mut header: Vec<&str> = p.feature_names.iter().map(String::as_str).collect();
        header.extend(["actual", "predicted", "probability"]);
        w.write_record(&header)?;

        for (i, raw) in p.raw.iter().enumerate() {
            let mut record: Vec<String> = raw.to_vec();
            record.push(p.actual[i].to_string());
            record.push(p.predicted[i].to_string());
            record.push(p.probability[i].to_string());
            w.write_record(&record)
                .with_context(|| format!("writing prediction row {}", i))?;
        }
        w.flush()?;
    }
    commit(tmp, &path)?;
    info!(path = %path.display(), rows = p.raw.len(), "wrote predictions");
    Ok(path)
}
