use anyhow::Result;
use arrow::array::Array;
use std::{fs, path::Path};
use supply_pipeline::{
    config::PipelineConfig,
    duck,
    error::CleanError,
    model::run_modeling,
    persist::read_processed,
    pipeline,
    table::{numeric_values, string_column},
};
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ROWS: usize = 40;

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,supply_pipeline=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

const HEADER: &str = "Type,Days for shipping (real),Days for shipment (scheduled),Sales,\
Delivery Status,Late_delivery_risk,Category Name,Customer Country,Customer Email,\
Customer Password,Market,Order Country,Order City,order date (DateOrders),\
Order Item Quantity,Order Profit Per Order,Order Zipcode,Product Description,\
Product Image,shipping date (DateOrders)";

/// A DataCo-shaped extract, latin-1 encoded, with a few missing cells.
fn dataset_bytes(bad_date_row: Option<usize>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(HEADER.as_bytes());
    out.push(b'\n');

    for i in 0..ROWS {
        let real = i % 6;
        let scheduled = if i % 2 == 0 { 2 } else { 4 };
        let late = (real > scheduled) as u8;
        let status = if late == 1 { "Late delivery" } else { "Shipping on time" };
        let sales = if i == 3 { String::new() } else { format!("{}.5", 10 + i) };
        let market = if i == 5 { "" } else if i % 3 == 0 { "LATAM" } else { "Europe" };
        let profit = if i == 7 { "NaN".to_string() } else { format!("{}", i as i64 - 10) };
        let order_date = match bad_date_row {
            Some(r) if r == i => "not-a-date".to_string(),
            _ => format!("{}/{}/2018 {}:{:02}", 1 + i % 12, 1 + i % 28, i % 24, i % 60),
        };
        let ship_date = format!("{}/{}/2018 23:59", 1 + i % 12, 1 + i % 28);
        let category = if i % 4 == 0 { "Cleats" } else { "Fishing" };

        let head = format!(
            "{},{},{},{},{},{},{},EE. UU.,XXXXXXXXX,XXXXXXXXX,{},",
            if i % 2 == 0 { "DEBIT" } else { "TRANSFER" },
            real,
            scheduled,
            sales,
            status,
            late,
            category,
            market,
        );
        out.extend_from_slice(head.as_bytes());
        // latin-1 "España"
        if i % 2 == 0 {
            out.extend_from_slice(b"Espa\xf1a");
        } else {
            out.extend_from_slice(b"EE. UU.");
        }
        let tail = format!(
            ",Caguas,{},{},{},,,http://images.example/{}.jpg,{}\n",
            order_date,
            1 + i % 5,
            profit,
            i,
            ship_date,
        );
        out.extend_from_slice(tail.as_bytes());
    }
    out
}

fn config(dir: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.paths.raw_input = dir.join("raw").join("DataCoSupplyChainDataset.csv");
    cfg.paths.processed_output = dir.join("processed").join("cleaned.csv");
    cfg.paths.processed_parquet = Some(dir.join("processed").join("cleaned.parquet"));
    cfg.paths.predictions_dir = dir.join("predictions");
    cfg.paths.metrics_report = dir.join("predictions").join("metrics.json");
    cfg.database.path = dir.join("supply_chain.duckdb");
    cfg.modeling.logistic_alpha = 1.0;
    cfg.modeling.forest_trees = 10;
    cfg.modeling.forest_max_depth = 4;
    cfg.modeling.forest_min_samples_split = 2;
    cfg
}

fn write_raw(cfg: &PipelineConfig, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(cfg.paths.raw_input.parent().unwrap())?;
    fs::write(&cfg.paths.raw_input, bytes)?;
    Ok(())
}

#[test]
fn test_full_pipeline() -> Result<()> {
    init_test_logging();
    let dir = TempDir::new()?;
    let cfg = config(dir.path());
    write_raw(&cfg, &dataset_bytes(None))?;

    let processed = pipeline::run(&cfg, None)?;
    assert_eq!(processed.num_rows(), ROWS);
    for (field, col) in processed.schema().fields().iter().zip(processed.columns()) {
        assert_eq!(col.null_count(), 0, "nulls left in {}", field.name());
    }

    // identifiers and low-value columns are gone, features appended
    let schema = processed.schema();
    for gone in ["customer_email", "customer_password", "product_image", "product_description", "order_zipcode"] {
        assert!(schema.index_of(gone).is_err(), "{} should be dropped", gone);
    }
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        &names[names.len() - 11..],
        &[
            "order_year",
            "order_month",
            "order_quarter",
            "order_day",
            "on_time_delivery",
            "delay_days",
            "is_weekend",
            "is_bulk_order",
            "is_international",
            "market_volume",
            "country_volume",
        ]
    );
    assert_eq!(string_column(&processed, "order_country")?.value(0), "España");
    assert_eq!(string_column(&processed, "market")?.value(5), "Unknown");

    // reload, then the two downstream stages
    let reloaded = read_processed(&cfg.paths.processed_output, &cfg)?;
    assert_eq!(reloaded.num_rows(), ROWS);
    assert_eq!(reloaded.num_columns(), processed.num_columns());
    assert!(cfg.paths.processed_parquet.as_ref().unwrap().exists());

    let conn = duck::open_disk_db(&cfg.database.path)?;
    let summary = duck::load_table(&conn, &cfg.database.table, &reloaded, cfg.database.batch_size)?;
    assert_eq!(summary.rows, ROWS as i64);
    assert!(summary.avg_delay_days.is_some());

    let report = run_modeling(&reloaded, &cfg)?;
    assert_eq!(report.train_rows + report.test_rows, ROWS);
    assert_eq!(report.models.len(), 2);
    assert!(report.balanced_classes);
    for model in &report.models {
        assert!(model.metrics.roc_auc.is_some(), "{} has no ROC-AUC", model.model);
    }
    assert!(cfg.paths.metrics_report.exists());
    for model in ["logistic_regression", "random_forest"] {
        let path = cfg.paths.predictions_dir.join(format!("predictions_{}.csv", model));
        let lines = fs::read_to_string(&path)?.lines().count();
        assert_eq!(lines, report.test_rows + 1);
    }
    Ok(())
}

#[test]
fn test_bad_date_writes_nothing() -> Result<()> {
    init_test_logging();
    let dir = TempDir::new()?;
    let cfg = config(dir.path());
    write_raw(&cfg, &dataset_bytes(Some(17)))?;

    let err = pipeline::run(&cfg, None).unwrap_err();
    match err.chain().find_map(|e| e.downcast_ref::<CleanError>()) {
        Some(CleanError::DateParse { row, value, .. }) => {
            assert_eq!(*row, 17);
            assert_eq!(value, "not-a-date");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!cfg.paths.processed_output.exists());
    Ok(())
}

#[test]
fn test_imputation_uses_median_of_present_values() -> Result<()> {
    init_test_logging();
    let dir = TempDir::new()?;
    let mut cfg = config(dir.path());
    // every row trains the imputer
    cfg.split.test_fraction = 0.0;
    write_raw(&cfg, &dataset_bytes(None))?;

    let processed = pipeline::run(&cfg, None)?;
    let sales = numeric_values(&processed, "sales")?;
    // 39 present values 10.5..=49.5 without 13.5
    assert_eq!(sales[3], Some(30.5));
    let profit = numeric_values(&processed, "order_profit_per_order")?;
    // -10..=29 without -3: median of 39 integers
    assert_eq!(profit[7], Some(10.0));
    Ok(())
}
