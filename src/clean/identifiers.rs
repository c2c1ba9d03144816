use anyhow::Result;
use arrow::{
    array::{Array, ArrayRef, StringArray},
    record_batch::RecordBatch,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CleaningConfig, IdentifierPolicy};
use crate::table::{cell_to_string, drop_columns, with_column};

/// Drop the low-value columns and apply the identifier policy.
/// Returns the cleaned batch and the names of the columns removed.
pub fn strip_columns(batch: &RecordBatch, cfg: &CleaningConfig) -> Result<(RecordBatch, Vec<String>)> {
    let mut to_drop = cfg.drop_columns.clone();
    let mut out = batch.clone();

    match cfg.identifier_policy {
        IdentifierPolicy::Drop => to_drop.extend(cfg.identifier_columns.iter().cloned()),
        IdentifierPolicy::Hash => {
            for name in &cfg.identifier_columns {
                let Ok(idx) = out.schema().index_of(name) else {
                    debug!(column = %name, "identifier column absent");
                    continue;
                };
                let hashed = hash_column(out.column(idx).as_ref());
                out = with_column(&out, name, hashed)?;
                info!(column = %name, "hashed identifier column");
            }
        }
    }

    let (out, dropped) = drop_columns(&out, &to_drop)?;
    for name in to_drop.iter().filter(|n| !dropped.contains(*n)) {
        debug!(column = %name, "drop requested for absent column");
    }
    Ok((out, dropped))
}

/// Lower-hex SHA-256 of each cell's text; nulls stay null.
fn hash_column(array: &dyn Array) -> ArrayRef {
    let hashed: StringArray = (0..array.len())
        .map(|row| cell_to_string(array, row).map(|v| hex_sha256(&v)))
        .collect();
    Arc::new(hashed)
}

fn hex_sha256(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("{:x}", digest)
}
