//! Writing the processed table.
//!
//! Both writers stage into a temporary file next to the destination and
//! rename it into place, so a failed run never leaves a truncated file at
//! the target path.

use anyhow::{Context, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use std::{
    fs,
    io::{BufWriter, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::clean::{parse_date_column, DateParser};
use crate::config::{Encoding, PipelineConfig};
use crate::table::{columns::TIMESTAMP_FORMAT, load_table, MissingValues};

pub(crate) fn staging_file(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut builder = tempfile::Builder::new();
    builder.prefix(".").suffix(".tmp");
    // same mode as `File::create`; the umask still applies
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
        .tempfile_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))
}

pub(crate) fn commit(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path)
        .with_context(|| format!("renaming temporary file to {}", path.display()))?;
    Ok(())
}

/// Comma-delimited with a header row; timestamps as `%Y-%m-%d %H:%M:%S`.
#[instrument(level = "info", skip(batch), fields(rows = batch.num_rows()))]
pub fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    let tmp = staging_file(path)?;
    {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_timestamp_format(TIMESTAMP_FORMAT.to_string())
            .build(BufWriter::new(tmp.as_file()));
        writer.write(batch).context("writing CSV rows")?;
        writer
            .into_inner()
            .flush()
            .context("flushing CSV output")?;
    }
    commit(tmp, path)?;
    info!(
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "wrote processed table"
    );
    Ok(())
}

#[instrument(level = "info", skip(batch), fields(rows = batch.num_rows()))]
pub fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<()> {
    let tmp = staging_file(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();
    let mut writer = ArrowWriter::try_new(tmp.as_file(), batch.schema(), Some(props))
        .context("initializing Parquet writer")?;
    writer.write(batch).context("writing Parquet batch")?;
    writer.close().context("closing Parquet writer")?;
    commit(tmp, path)?;
    info!(path = %path.display(), "wrote Parquet copy");
    Ok(())
}

/// Load a processed table written by [`write_csv`], restoring the date
/// columns to timestamps.
#[instrument(level = "info", skip(cfg))]
pub fn read_processed(path: &Path, cfg: &PipelineConfig) -> Result<RecordBatch> {
    let missing = MissingValues::new(cfg.cleaning.missing_tokens.iter());
    let mut batch = load_table(path, Encoding::Utf8, &missing)
        .with_context(|| format!("loading processed table {}", path.display()))?;
    let parser = DateParser::new(cfg.cleaning.date_formats.clone());
    for column in &cfg.cleaning.date_columns {
        batch = parse_date_column(&batch, column, &parser)?;
    }
    info!(rows = batch.num_rows(), columns = batch.num_columns(), "reloaded processed table");
    Ok(batch)
}
