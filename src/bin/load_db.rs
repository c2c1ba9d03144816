use anyhow::Result;
use supply_pipeline::{duck, init_logging, persist::read_processed, PipelineConfig};
use tracing::info;

fn main() -> Result<()> {
    init_logging();
    let cfg = PipelineConfig::load()?;

    let batch = read_processed(&cfg.paths.processed_output, &cfg)?;
    let conn = duck::open_disk_db(&cfg.database.path)?;
    let summary = duck::load_table(&conn, &cfg.database.table, &batch, cfg.database.batch_size)?;

    info!(
        db = %cfg.database.path.display(),
        table = %cfg.database.table,
        rows = summary.rows,
        avg_delay_days = ?summary.avg_delay_days,
        "data loaded"
    );
    Ok(())
}
