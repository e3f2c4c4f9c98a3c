//! IterationMeta - per-iteration statistics from the analysis loop

use serde::{Deserialize, Serialize};

use crate::StageFailure;

/// Statistics of one published iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationMeta {
    /// Snapshot sequence published by this iteration
    pub sequence: u64,

    /// Wall time spent in the iteration (ms)
    pub latency_ms: f64,

    /// Detections after sanitising
    pub detections: usize,

    /// Tracks reported by the tracker
    pub tracks: usize,

    /// Tracks that made it into the snapshot
    pub published: usize,

    /// Tracks dropped because projection failed
    pub unresolved: usize,

    /// Failed stage, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_failure: Option<StageFailure>,

    /// The frame was analysed before; only telemetry and locations changed
    #[serde(default)]
    pub reused_frame: bool,
}

impl StageFailure {
    /// Metric label of the failed stage
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Detection(_) => "detection",
            Self::Tracking(_) => "tracking",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Detection(m) | Self::Tracking(m) => m,
        }
    }
}
