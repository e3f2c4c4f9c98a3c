//! Command channel error types

use contracts::{CommandKind, CommandParseError, CommandStatus, TaskId, TrackId};
use thiserror::Error;

/// Command channel errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Referenced track is not in the latest snapshot
    #[error("track {track_id} not found in the latest snapshot")]
    NotFound { track_id: TrackId },

    #[error("unknown command kind '{0}'")]
    UnknownKind(String),

    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    /// Recognised command the vehicle link does not perform
    #[error("{kind} is not implemented")]
    NotImplemented { kind: CommandKind },

    /// The vehicle link rejected or failed the request
    #[error("vehicle link '{link}' failed: {message}")]
    VehicleLink { link: String, message: String },

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("task {task} cannot move from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: CommandStatus,
        to: CommandStatus,
    },
}

impl CommandError {
    /// Create a vehicle link error
    pub fn vehicle_link(link: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VehicleLink {
            link: link.into(),
            message: message.into(),
        }
    }
}

impl From<CommandParseError> for CommandError {
    fn from(err: CommandParseError) -> Self {
        match err {
            CommandParseError::UnknownKind(kind) => Self::UnknownKind(kind),
            CommandParseError::MissingArgument { kind, argument } => Self::InvalidArgument {
                argument: argument.to_string(),
                message: format!("required by {kind}"),
            },
            CommandParseError::InvalidArgument { argument, value } => Self::InvalidArgument {
                argument: argument.to_string(),
                message: format!("invalid value '{value}'"),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
