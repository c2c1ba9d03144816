pub mod dates;
pub mod identifiers;
pub mod impute;
pub mod names;
pub mod translate;

pub use dates::{parse_date_column, DateParser};
pub use identifiers::strip_columns;
pub use impute::{FillValue, ImputationStats, Imputer};
pub use names::{normalize_batch_names, normalize_column_name};
pub use translate::{HttpTranslator, RetryingTranslator, TranslationSummary, Translator};

use anyhow::{Context, Result};
use arrow::{array::Array, record_batch::RecordBatch};
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::partition::{assign_partitions, partition_array, training_mask};
use crate::table::with_column;

/// What the cleaner did, for logging.
#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub rows: usize,
    pub dropped_columns: Vec<String>,
    pub imputation: ImputationStats,
    pub translations: Vec<TranslationSummary>,
}

/// Run every cleaning step over `batch`.
///
/// Row count is preserved. On success no column holds nulls, and the
/// train/test assignment is carried in `split.split_column`.
#[instrument(level = "info", skip_all, fields(rows = batch.num_rows()))]
pub fn clean_table(
    batch: &RecordBatch,
    cfg: &PipelineConfig,
    translator: Option<&RetryingTranslator>,
) -> Result<(RecordBatch, CleaningReport)> {
    let rows_in = batch.num_rows();

    // 1) names
    let mut out = normalize_batch_names(batch)?;

    // 2) dates
    let parser = DateParser::new(cfg.cleaning.date_formats.clone());
    for column in &cfg.cleaning.date_columns {
        out = parse_date_column(&out, column, &parser)
            .with_context(|| format!("parsing date column {}", column))?;
    }

    // 3) low-value and identifier columns
    let (stripped, dropped_columns) = strip_columns(&out, &cfg.cleaning)?;
    out = stripped;

    // 4) partition before any statistic is fit
    let parts = assign_partitions(&out, &cfg.split);
    out = with_column(&out, &cfg.split.split_column, partition_array(&parts))?;

    // 5) imputation
    let imputer = Imputer::new(cfg.cleaning.text_sentinel.clone())
        .excluding(std::slice::from_ref(&cfg.split.split_column));
    let imputation = imputer.fit(&out, &training_mask(&parts))?;
    out = imputer.transform(&out, &imputation)?;

    // 6) translation
    let mut translations = Vec::new();
    if let Some(t) = translator {
        let (translated, summaries) =
            translate::translate_columns(&out, &cfg.translation.columns, t)?;
        out = translated;
        translations = summaries;
    }

    debug_assert_eq!(out.num_rows(), rows_in);
    let remaining_nulls: usize = out.columns().iter().map(|c| c.null_count()).sum();
    info!(
        rows = out.num_rows(),
        columns = out.num_columns(),
        dropped = dropped_columns.len(),
        remaining_nulls,
        "cleaning complete"
    );

    Ok((
        out,
        CleaningReport {
            rows: rows_in,
            dropped_columns,
            imputation,
            translations,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{numeric_values, raw_to_batch, string_column, MissingValues, RawTable};

    fn raw() -> RawTable {
        let headers = [
            "Order Date (DateOrders)",
            "Shipping Date (DateOrders)",
            "Sales",
            "Market",
            "Customer Email",
            "Late_delivery_risk",
        ];
        let rows = [
            ["1/31/2018 22:56", "2/3/2018 22:56", "10", "LATAM", "XXXXXXXXX", "1"],
            ["1/13/2018 12:27", "1/18/2018 12:27", "", "", "XXXXXXXXX", "0"],
            ["1/13/2018 12:06", "1/17/2018 12:06", "30", "Europe", "XXXXXXXXX", "1"],
        ];
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn all_train() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.split.test_fraction = 0.0;
        cfg
    }

    #[test]
    fn test_clean_fills_and_keeps_rows() -> Result<()> {
        let batch = raw_to_batch(&raw(), &MissingValues::default())?;
        let (out, report) = clean_table(&batch, &all_train(), None)?;

        assert_eq!(out.num_rows(), 3);
        assert_eq!(report.rows, 3);
        assert_eq!(report.dropped_columns, vec!["customer_email".to_string()]);
        for col in out.columns() {
            assert_eq!(col.null_count(), 0);
        }
        assert_eq!(numeric_values(&out, "sales")?[1], Some(20.0));
        assert_eq!(string_column(&out, "market")?.value(1), "Unknown");
        assert_eq!(string_column(&out, "dataset_split")?.value(0), "train");
        Ok(())
    }

    #[test]
    fn test_bad_date_aborts() -> Result<()> {
        let mut table = raw();
        table.rows[2][0] = "yesterday".to_string();
        let batch = raw_to_batch(&table, &MissingValues::default())?;
        let err = clean_table(&batch, &all_train(), None).unwrap_err();
        assert!(err
            .chain()
            .any(|e| e.downcast_ref::<crate::error::CleanError>().is_some()));
        Ok(())
    }
}
