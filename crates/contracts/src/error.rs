//! Layered error definitions
//!
//! Categorized by source: config / telemetry / perception / projection / sink

use thiserror::Error;

use crate::TelemetryChannel;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Acquisition Errors =====
    /// No sample has ever arrived on a telemetry channel
    #[error("telemetry unavailable: no {channel} sample received yet")]
    TelemetryUnavailable { channel: TelemetryChannel },

    /// No decoded frame has arrived from the stream yet
    #[error("video unavailable: no frame received yet")]
    FrameUnavailable,

    // ===== Perception Errors =====
    /// Detector call failed
    #[error("detector '{detector}' failed: {message}")]
    DetectionFailure { detector: String, message: String },

    /// Tracker call failed
    #[error("tracker '{tracker}' failed: {message}")]
    TrackerFailure { tracker: String, message: String },

    // ===== Projection Errors =====
    /// Ray never meets terrain for this track
    #[error("projection unresolved for track {track_id}: {reason}")]
    ProjectionUnresolved { track_id: u64, reason: String },

    /// Terrain model could not be loaded
    #[error("terrain load error for '{source_name}': {message}")]
    TerrainLoad {
        source_name: String,
        message: String,
    },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create detector failure
    pub fn detection(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DetectionFailure {
            detector: detector.into(),
            message: message.into(),
        }
    }

    /// Create tracker failure
    pub fn tracker(tracker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TrackerFailure {
            tracker: tracker.into(),
            message: message.into(),
        }
    }

    /// Create terrain load error
    pub fn terrain_load(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TerrainLoad {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error only affects the current loop iteration
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TelemetryUnavailable { .. }
                | Self::FrameUnavailable
                | Self::DetectionFailure { .. }
                | Self::TrackerFailure { .. }
                | Self::ProjectionUnresolved { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_unavailable_message() {
        let err = ContractError::TelemetryUnavailable {
            channel: TelemetryChannel::Gimbal,
        };
        assert_eq!(
            err.to_string(),
            "telemetry unavailable: no gimbal sample received yet"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_config_errors_are_not_transient() {
        assert!(!ContractError::config_parse("bad").is_transient());
        assert!(!ContractError::config_validation("analysis", "bad").is_transient());
    }
}
