//! Dispatcher error types

use contracts::{ContractError, SinkType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be opened; nothing was started
    #[error("cannot open {sink_type:?} sink '{name}': {source}")]
    SinkCreation {
        name: String,
        sink_type: SinkType,
        #[source]
        source: ContractError,
    },
}

impl DispatcherError {
    pub fn sink_creation(
        name: impl Into<String>,
        sink_type: SinkType,
        source: ContractError,
    ) -> Self {
        Self::SinkCreation {
            name: name.into(),
            sink_type,
            source,
        }
    }

    /// Name of the sink that failed
    pub fn sink_name(&self) -> &str {
        match self {
            Self::SinkCreation { name, .. } => name,
        }
    }
}
