//! Ingestion error types

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Frame metadata disagrees with its pixel buffer
    #[error("inconsistent frame: {width}x{height} with {len} bytes")]
    InconsistentFrame {
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
        /// Actual buffer length
        len: usize,
    },

    /// A feed with this name is already registered
    #[error("feed {name} is already registered")]
    DuplicateFeed {
        /// Feed name
        name: String,
    },

    /// No feed with this name
    #[error("feed {name} not found")]
    FeedNotFound {
        /// Feed name
        name: String,
    },
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
