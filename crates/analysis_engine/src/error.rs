//! Analysis engine errors

use thiserror::Error;

/// Analysis engine error type
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The loop thread could not be started
    #[error("failed to spawn analysis thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The loop thread panicked
    #[error("analysis thread '{name}' panicked")]
    Panicked { name: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
