pub mod clean;
pub mod config;
pub mod duck;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod partition;
pub mod persist;
pub mod pipeline;
pub mod stats;
pub mod table;

pub use config::PipelineConfig;
pub use logging::init_logging;
