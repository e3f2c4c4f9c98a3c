//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the pipeline: telemetry
//! and frame types, detector/tracker/terrain capabilities, the published
//! snapshot, operator commands and the mission blueprint.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Units
//! - Angles are radians, except latitude/longitude which are degrees
//! - Heading is clockwise from true north
//! - Altitudes and elevations share one vertical datum (metres)

mod blueprint;
mod capability;
mod command;
mod error;
mod feed;
mod frame;
mod geo;
mod iteration;
mod settings;
mod sink;
mod snapshot;
mod telemetry;
mod track;

pub use blueprint::*;
pub use capability::{DetectionParams, Detector, TerrainModel, Tracker};
pub use command::*;
pub use error::*;
pub use feed::{FrameCallback, TelemetryCallback, TelemetryFeed, VideoFeed};
pub use frame::*;
pub use geo::GeoPoint;
pub use iteration::IterationMeta;
pub use settings::DetectionSettings;
pub use sink::*;
pub use snapshot::*;
pub use telemetry::*;
pub use track::*;
