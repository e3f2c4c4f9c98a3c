//! # Analysis Engine
//!
//! The perception loop: freshest frame and telemetry in, geo-referenced
//! tracks out.
//!
//! Each iteration:
//! - reads the latest frame and vehicle state without blocking
//! - runs the detector with the current [`DetectionSettings`]
//! - feeds the tracker and projects every track onto the terrain
//! - swaps a new [`AnalysisSnapshot`] into the output cell
//!
//! ## Example
//!
//! ```ignore
//! use analysis_engine::{AnalysisLoop, IouTracker, ScriptedDetector};
//!
//! let analysis = AnalysisLoop::new(
//!     pipeline.telemetry().clone(),
//!     pipeline.video().clone(),
//!     Box::new(detector),
//!     Box::new(IouTracker::default()),
//!     projector,
//! );
//! let snapshots = analysis.snapshots();
//!
//! let handle = analysis.spawn()?;
//! // ... read snapshots.latest() ...
//! handle.stop();
//! let summary = handle.join()?;
//! ```

mod engine;
mod error;
mod iou_tracker;
pub mod mock;
mod settings;

pub use engine::{
    AnalysisHandle, AnalysisLoop, AnalysisLoopConfig, IterationOutcome, LoopCounters, LoopStats,
    SkipReason,
};
pub use error::{AnalysisError, Result};
pub use iou_tracker::{IouTracker, IouTrackerConfig};
pub use mock::ScriptedDetector;
pub use settings::SettingsHandle;

pub use contracts::{AnalysisSnapshot, DetectionSettings, IterationMeta};
