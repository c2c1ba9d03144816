use anyhow::Result;
use supply_pipeline::{init_logging, model::run_modeling, persist::read_processed, PipelineConfig};
use tracing::info;

fn main() -> Result<()> {
    init_logging();
    let cfg = PipelineConfig::load()?;

    let batch = read_processed(&cfg.paths.processed_output, &cfg)?;
    let report = run_modeling(&batch, &cfg)?;

    for m in &report.models {
        let top: Vec<&str> = m
            .feature_importance
            .iter()
            .take(5)
            .map(|f| f.feature.as_str())
            .collect();
        info!(
            model = %m.model,
            accuracy = m.metrics.accuracy,
            f1 = m.metrics.f1,
            roc_auc = ?m.metrics.roc_auc,
            top_features = ?top,
            "summary"
        );
    }
    info!(report = %cfg.paths.metrics_report.display(), "training done");
    Ok(())
}
