//! Pipeline configuration.
//!
//! Layered with `figment`: built-in defaults, then an optional YAML file, then
//! `SUPPLY_`-prefixed environment variables (`SUPPLY_PATHS__RAW_INPUT`,
//! `SUPPLY_TRANSLATION__ENDPOINT`, ...). The resulting value is passed by
//! reference into every stage.

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "SUPPLY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "pipeline.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub cleaning: CleaningConfig,
    pub translation: TranslationConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub modeling: ModelingConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Latin1,
    Utf8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_input: PathBuf,
    pub raw_encoding: Encoding,
    pub processed_output: PathBuf,
    /// Optional Parquet copy of the processed table.
    pub processed_parquet: Option<PathBuf>,
    pub predictions_dir: PathBuf,
    pub metrics_report: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_input: PathBuf::from("data/raw/DataCoSupplyChainDataset.csv"),
            raw_encoding: Encoding::Latin1,
            processed_output: PathBuf::from(
                "data/processed/cleaned_dataco_supply_chain_dataset.csv",
            ),
            processed_parquet: None,
            predictions_dir: PathBuf::from("data/predictions"),
            metrics_report: PathBuf::from("data/predictions/metrics.json"),
        }
    }
}

/// What happens to direct identifiers (email, password, image URL).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierPolicy {
    #[default]
    Drop,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    pub date_columns: Vec<String>,
    pub date_formats: Vec<String>,
    pub drop_columns: Vec<String>,
    pub identifier_columns: Vec<String>,
    pub identifier_policy: IdentifierPolicy,
    pub missing_tokens: Vec<String>,
    pub text_sentinel: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            date_columns: strings(&["order_date_dateorders", "shipping_date_dateorders"]),
            date_formats: strings(&[
                "%m/%d/%Y %H:%M",
                "%m/%d/%Y %H:%M:%S",
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%dT%H:%M:%S",
                "%Y/%m/%d %H:%M:%S",
                "%Y-%m-%d",
                "%m/%d/%Y",
            ]),
            drop_columns: strings(&["product_description", "order_zipcode"]),
            identifier_columns: strings(&["customer_email", "customer_password", "product_image"]),
            identifier_policy: IdentifierPolicy::Drop,
            missing_tokens: strings(&[
                "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A",
            ]),
            text_sentinel: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    /// LibreTranslate-compatible endpoint. Translation is off when unset.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub columns: Vec<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            source_language: "auto".to_string(),
            target_language: "en".to_string(),
            columns: strings(&["order_country", "order_city", "order_state", "order_region"]),
            timeout_ms: 10_000,
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl TranslationConfig {
    pub fn enabled(&self) -> bool {
        self.endpoint.is_some() && !self.columns.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    pub order_date_column: String,
    pub bulk_percentile: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            order_date_column: "order_date_dateorders".to_string(),
            bulk_percentile: 75.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub label_column: String,
    pub split_column: String,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            label_column: "late_delivery_risk".to_string(),
            split_column: "dataset_split".to_string(),
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelingConfig {
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub logistic_alpha: f64,
    pub forest_trees: u16,
    pub forest_max_depth: u16,
    pub forest_min_samples_split: usize,
    /// Give both classes equal weight in training: minority rows are
    /// repeated for logistic regression and each forest tree draws a
    /// class-balanced bootstrap sample.
    pub balance_classes: bool,
}

impl Default for ModelingConfig {
    fn default() -> Self {
        Self {
            numeric_features: strings(&[
                "order_item_quantity",
                "on_time_delivery",
                "delay_days",
                "order_year",
                "order_quarter",
                "is_weekend",
                "is_bulk_order",
                "sales",
                "order_profit_per_order",
            ]),
            categorical_features: strings(&["market", "category_name", "delivery_status", "type"]),
            logistic_alpha: 0.0,
            forest_trees: 100,
            forest_max_depth: 10,
            forest_min_samples_split: 10,
            balance_classes: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub table: String,
    pub batch_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/supply_chain.duckdb"),
            table: "orders".to_string(),
            batch_size: 1000,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PipelineConfig {
    /// Load from the file named by `SUPPLY_CONFIG` (default `pipeline.yaml`,
    /// skipped when absent) plus environment overrides.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, Box<figment::Error>> {
        let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));
        if path.exists() {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed("SUPPLY_").split("__"));
        figment.extract().map_err(Box::new)
    }
}
