//! Optional translation of categorical text to a canonical language.
//!
//! Each distinct value of a column is translated once and the result mapped
//! back onto every row, so the number of external calls is bounded by the
//! column's cardinality rather than its row count.

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    record_batch::RecordBatch,
};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    thread::sleep,
    time::Duration,
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::TranslationConfig;
use crate::error::TranslateError;
use crate::table::{string_column, with_column};

/// An external translation capability.
pub trait Translator {
    fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
pub struct HttpTranslator {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    source: String,
    target: String,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl HttpTranslator {
    pub fn new(endpoint: &str, cfg: &TranslationConfig) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid translation endpoint {}", endpoint))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("building translation HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key: cfg.api_key.clone(),
            source: cfg.source_language.clone(),
            target: cfg.target_language.clone(),
        })
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let body = TranslateRequest {
            q: text,
            source: &self.source,
            target: &self.target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .map_err(|e| TranslateError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TranslateError::Status {
                status: status.as_u16(),
            });
        }
        let parsed: TranslateResponse = resp
            .json()
            .map_err(|e| TranslateError::Response(e.to_string()))?;
        Ok(parsed.translated_text)
    }
}

/// Upper bound on a single retry delay.
const MAX_BACKOFF_MS: u64 = 60_000;

/// `initial_ms * 2^(attempt - 1)`, saturating at [`MAX_BACKOFF_MS`].
fn backoff_ms(initial_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    initial_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Retries a [`Translator`] with exponential backoff and, once retries are
/// exhausted, passes the original text through untranslated.
pub struct RetryingTranslator {
    inner: Box<dyn Translator>,
    max_retries: u32,
    initial_backoff_ms: u64,
}

impl RetryingTranslator {
    pub fn new(inner: Box<dyn Translator>, max_retries: u32, initial_backoff_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            initial_backoff_ms,
        }
    }

    /// Build the HTTP-backed translator when an endpoint is configured.
    pub fn from_config(cfg: &TranslationConfig) -> Result<Option<Self>> {
        let Some(endpoint) = cfg.endpoint.as_deref() else {
            return Ok(None);
        };
        let http = HttpTranslator::new(endpoint, cfg)?;
        Ok(Some(Self::new(
            Box::new(http),
            cfg.max_retries,
            cfg.initial_backoff_ms,
        )))
    }

    pub fn translate_or_passthrough(&self, text: &str) -> String {
        let mut attempts = 0;
        loop {
            match self.inner.translate(text) {
                Ok(t) => return t,
                Err(e) if attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = backoff_ms(self.initial_backoff_ms, attempts);
                    warn!(text, attempt = attempts, delay_ms = backoff, error = %e, "Retrying translation");
                    sleep(Duration::from_millis(backoff));
                }
                Err(e) => {
                    error!(text, error = %e, "Exhausted retries, keeping untranslated value");
                    return text.to_string();
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationSummary {
    pub column: String,
    pub distinct_values: usize,
    pub changed_values: usize,
}

/// Translate one text column through `translator`, one call per distinct value.
pub fn translate_column(
    batch: &RecordBatch,
    column: &str,
    translator: &RetryingTranslator,
) -> Result<(RecordBatch, TranslationSummary)> {
    let values = string_column(batch, column)?;

    // distinct values, first-appearance order
    let mut seen = HashSet::new();
    let distinct: Vec<&str> = values
        .iter()
        .flatten()
        .filter(|v| seen.insert(*v))
        .collect();

    let mut lookup: HashMap<&str, String> = HashMap::with_capacity(distinct.len());
    for v in &distinct {
        let translated = translator.translate_or_passthrough(v);
        debug!(column, from = %v, to = %translated, "translated");
        lookup.insert(*v, translated);
    }

    let changed_values = lookup.iter().filter(|(k, v)| **k != v.as_str()).count();
    let translated: StringArray = values
        .iter()
        .map(|v| v.map(|v| lookup.get(v).map(String::as_str).unwrap_or(v)))
        .collect();

    let summary = TranslationSummary {
        column: column.to_string(),
        distinct_values: distinct.len(),
        changed_values,
    };
    let out = with_column(batch, column, Arc::new(translated) as ArrayRef)?;
    Ok((out, summary))
}

/// Translate every configured column that exists in `batch`.
pub fn translate_columns(
    batch: &RecordBatch,
    columns: &[String],
    translator: &RetryingTranslator,
) -> Result<(RecordBatch, Vec<TranslationSummary>)> {
    let mut out = batch.clone();
    let mut summaries = Vec::new();
    for column in columns {
        if out.schema().index_of(column).is_err() {
            warn!(column = %column, "translation column absent, skipping");
            continue;
        }
        let (next, summary) = translate_column(&out, column, translator)?;
        info!(
            column = %column,
            distinct = summary.distinct_values,
            changed = summary.changed_values,
            "column translated"
        );
        out = next;
        summaries.push(summary);
    }
    Ok((out, summaries))
}
