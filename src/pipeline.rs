use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use tracing::{info, instrument};

use crate::clean::{clean_table, RetryingTranslator};
use crate::config::PipelineConfig;
use crate::features::FeatureRegistry;
use crate::logging::log_memory;
use crate::persist::{write_csv, write_parquet};
use crate::table::{load_table, MissingValues};

/// Load, clean, derive features and persist. Nothing is written unless every
/// earlier stage succeeds.
#[instrument(level = "info", skip_all, fields(input = %cfg.paths.raw_input.display()))]
pub fn run(cfg: &PipelineConfig, translator: Option<&RetryingTranslator>) -> Result<RecordBatch> {
    let missing = MissingValues::new(cfg.cleaning.missing_tokens.iter());
    let raw = load_table(&cfg.paths.raw_input, cfg.paths.raw_encoding, &missing)
        .with_context(|| format!("loading {}", cfg.paths.raw_input.display()))?;
    info!(rows = raw.num_rows(), columns = raw.num_columns(), "loaded raw table");
    log_memory("load");

    let (cleaned, report) = clean_table(&raw, cfg, translator)?;
    info!(
        rows = report.rows,
        dropped = ?report.dropped_columns,
        imputed = report.imputation.fills.len(),
        translated = report.translations.len(),
        "cleaned"
    );

    let processed = FeatureRegistry::standard(&cfg.features).derive(&cleaned)?;
    log_memory("features");

    write_csv(&processed, &cfg.paths.processed_output)?;
    if let Some(parquet) = &cfg.paths.processed_parquet {
        write_parquet(&processed, parquet)?;
    }
    Ok(processed)
}
