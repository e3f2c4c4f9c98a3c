//! AnalysisSnapshot - AnalysisLoop output
//!
//! The single published result unit. Immutable once published; the next
//! publish replaces it as a whole.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CameraFrame, GeoPoint, Track, TrackId, VehicleState};

/// Track with its resolved ground position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub track: Track,
    pub location: GeoPoint,
}

/// Stage that failed during an iteration which still published telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "message", rename_all = "snake_case")]
pub enum StageFailure {
    Detection(String),
    Tracking(String),
}

/// Published analysis result
#[derive(Debug, Clone)]
pub struct AnalysisSnapshot {
    /// Publish time (strictly increasing across publishes)
    pub timestamp: DateTime<Utc>,

    /// Publish sequence number (monotonically increasing)
    pub sequence: u64,

    /// Telemetry used for this iteration
    pub vehicle_state: VehicleState,

    /// Frame analysed in this iteration
    pub camera_frame: Arc<CameraFrame>,

    /// Resolved tracks, at most one entry per track id
    pub tracks: Vec<TrackedObject>,

    /// Set when detection or tracking failed and `tracks` is empty because of it
    pub stage_failure: Option<StageFailure>,
}

impl AnalysisSnapshot {
    /// Ground position of a track present in this snapshot
    pub fn locate(&self, track_id: TrackId) -> Option<GeoPoint> {
        self.tracks
            .iter()
            .find(|t| t.track.id == track_id)
            .map(|t| t.location)
    }

    /// Track ids present in this snapshot
    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.iter().map(|t| t.track.id)
    }

    /// Serializable summary without pixel data
    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            timestamp: self.timestamp,
            sequence: self.sequence,
            vehicle_state: self.vehicle_state,
            frame: FrameInfo {
                sequence: self.camera_frame.sequence,
                width: self.camera_frame.width,
                height: self.camera_frame.height,
                fov_horizontal: self.camera_frame.fov_horizontal,
                fov_vertical: self.camera_frame.fov_vertical(),
            },
            tracks: self.tracks.clone(),
            stage_failure: self.stage_failure.clone(),
        }
    }
}

/// Serializable form of a snapshot, as handed to storage / network sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    pub vehicle_state: VehicleState,
    pub frame: FrameInfo,
    pub tracks: Vec<TrackedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_failure: Option<StageFailure>,
}

/// Frame metadata carried by a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameInfo {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub fov_horizontal: f64,
    pub fov_vertical: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, PixelFormat};
    use bytes::Bytes;

    fn sample_snapshot() -> AnalysisSnapshot {
        let frame = CameraFrame::new(Bytes::new(), 640, 480, PixelFormat::Rgb8, 1.0);
        AnalysisSnapshot {
            timestamp: Utc::now(),
            sequence: 7,
            vehicle_state: VehicleState::default(),
            camera_frame: Arc::new(frame),
            tracks: vec![TrackedObject {
                track: Track {
                    id: 3,
                    bbox: BoundingBox::new(10.0, 10.0, 20.0, 20.0),
                    class_id: 1,
                },
                location: GeoPoint::new(-35.3, 149.1, 580.0),
            }],
            stage_failure: None,
        }
    }

    #[test]
    fn test_locate_present_and_absent() {
        let snapshot = sample_snapshot();
        assert_eq!(
            snapshot.locate(3),
            Some(GeoPoint::new(-35.3, 149.1, 580.0))
        );
        assert_eq!(snapshot.locate(4), None);
    }

    #[test]
    fn test_record_serializes_without_pixels() {
        let record = sample_snapshot().to_record();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"sequence\":7"));
        assert!(!json.contains("pixels"));
        assert!(!json.contains("stage_failure"));
    }

    #[test]
    fn test_stage_failure_serialization() {
        let failure = StageFailure::Detection("timeout".into());
        let json = serde_json::to_string(&failure).unwrap();
        assert_eq!(json, r#"{"stage":"detection","message":"timeout"}"#);
    }
}
