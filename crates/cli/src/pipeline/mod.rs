//! Pipeline orchestration module.

mod orchestrator;
mod script;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use script::{load_script, ScriptedCommand};
pub use stats::PipelineStats;
