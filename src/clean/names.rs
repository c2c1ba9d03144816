use arrow::{
    datatypes::{Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::HashSet, sync::Arc};

use crate::error::CleanError;

/// Trim, lower-case, spaces to underscores, drop parentheses.
///
/// `"Days for shipping (real)"` becomes `"days_for_shipping_real"`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(['(', ')'], "")
        .trim()
        .to_string()
}

/// Rename every column of `batch` with [`normalize_column_name`].
pub fn normalize_batch_names(batch: &RecordBatch) -> anyhow::Result<RecordBatch> {
    let schema = batch.schema();
    let mut seen = HashSet::with_capacity(schema.fields().len());
    let mut fields = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let name = normalize_column_name(field.name());
        if !seen.insert(name.clone()) {
            return Err(CleanError::DuplicateColumn { column: name }.into());
        }
        fields.push(Field::new(name, field.data_type().clone(), field.is_nullable()));
    }

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        batch.columns().to_vec(),
    )?)
}
