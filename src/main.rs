use anyhow::Result;
use supply_pipeline::{clean::RetryingTranslator, init_logging, pipeline, PipelineConfig};
use tracing::info;

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    init_logging();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let cfg = PipelineConfig::load()?;
    info!(
        input = %cfg.paths.raw_input.display(),
        output = %cfg.paths.processed_output.display(),
        "configuration loaded"
    );

    // ─── 3) optional translation service ─────────────────────────────
    let translator = if cfg.translation.enabled() {
        RetryingTranslator::from_config(&cfg.translation)?
    } else {
        info!("translation disabled");
        None
    };

    // ─── 4) load → clean → features → persist ───────────────────────
    let processed = pipeline::run(&cfg, translator.as_ref())?;

    info!(rows = processed.num_rows(), "all done");
    Ok(())
}
