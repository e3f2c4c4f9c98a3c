//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Command script could not be read or parsed
    #[error("Invalid command script {}: {message}", path.display())]
    CommandScript { path: PathBuf, message: String },

    /// Pipeline component failed to start
    #[error("Failed to start {component}: {message}")]
    Startup {
        component: &'static str,
        message: String,
    },

    /// Graceful shutdown error
    #[error("Error during shutdown: {message}")]
    Shutdown { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn command_script(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::CommandScript {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn startup(component: &'static str, message: impl ToString) -> Self {
        Self::Startup {
            component,
            message: message.to_string(),
        }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
