//! Greedy IoU tracker
//!
//! Associates each frame's detections with live tracks by box overlap.
//! Good enough for slow scenes and for exercising the pipeline; a real
//! deployment plugs its own [`Tracker`] in.

use contracts::{
    BoundingBox, CameraFrame, ClassId, ContractError, Detection, Track, TrackId, Tracker,
};
use tracing::trace;

/// IoU tracker tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IouTrackerConfig {
    /// Minimum overlap for a detection to continue a track
    pub iou_threshold: f64,

    /// Frames a track survives without a matching detection
    pub max_age: u32,

    /// Matches needed before a track is reported
    pub min_hits: u32,
}

impl Default for IouTrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_age: 30,
            min_hits: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct TrackState {
    id: TrackId,
    bbox: BoundingBox,
    class_id: ClassId,
    /// Frames since last matched
    misses: u32,
    hits: u32,
}

/// Greedy IoU multi-object tracker
///
/// Track ids start at 1, grow monotonically and are never reused.
#[derive(Debug)]
pub struct IouTracker {
    config: IouTrackerConfig,
    tracks: Vec<TrackState>,
    next_id: TrackId,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(IouTrackerConfig::default())
    }
}

impl IouTracker {
    pub fn new(config: IouTrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Tracks currently kept alive, reported or not
    pub fn live_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Candidate (track, detection) pairs, best overlap first
    fn candidate_pairs(&self, detections: &[Detection]) -> Vec<(usize, usize, f64)> {
        let mut pairs = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                if det.class_id != track.class_id {
                    continue;
                }
                let iou = track.bbox.iou(&det.bbox);
                if iou >= self.config.iou_threshold {
                    pairs.push((ti, di, iou));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.total_cmp(&a.2));
        pairs
    }
}

impl Tracker for IouTracker {
    fn name(&self) -> &str {
        "iou_tracker"
    }

    fn update(
        &mut self,
        _frame: &CameraFrame,
        detections: &[Detection],
    ) -> Result<Vec<Track>, ContractError> {
        let mut track_matched = vec![false; self.tracks.len()];
        let mut det_matched = vec![false; detections.len()];

        for (ti, di, _) in self.candidate_pairs(detections) {
            if track_matched[ti] || det_matched[di] {
                continue;
            }
            track_matched[ti] = true;
            det_matched[di] = true;

            let track = &mut self.tracks[ti];
            track.bbox = detections[di].bbox;
            track.misses = 0;
            track.hits += 1;
        }

        for (track, matched) in self.tracks.iter_mut().zip(&track_matched) {
            if !matched {
                track.misses += 1;
            }
        }

        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.misses <= max_age);

        for (det, matched) in detections.iter().zip(&det_matched) {
            if *matched {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            trace!(track_id = id, class_id = det.class_id, "new track");
            self.tracks.push(TrackState {
                id,
                bbox: det.bbox,
                class_id: det.class_id,
                misses: 0,
                hits: 1,
            });
        }

        Ok(self
            .tracks
            .iter()
            .filter(|t| t.misses == 0 && t.hits >= self.config.min_hits)
            .map(|t| Track {
                id: t.id,
                bbox: t.bbox,
                class_id: t.class_id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::PixelFormat;

    fn frame() -> CameraFrame {
        CameraFrame::new(Bytes::new(), 640, 480, PixelFormat::Rgb8, 1.0)
    }

    fn det(x: f64, y: f64, class_id: ClassId) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, y, x + 40.0, y + 40.0),
            score: 0.9,
            class_id,
        }
    }

    #[test]
    fn test_ids_persist_across_frames() {
        let mut tracker = IouTracker::default();
        let first = tracker
            .update(&frame(), &[det(100.0, 100.0, 0), det(300.0, 200.0, 0)])
            .unwrap();
        assert_eq!(first.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);

        // both objects moved a few pixels
        let second = tracker
            .update(&frame(), &[det(305.0, 203.0, 0), det(104.0, 102.0, 0)])
            .unwrap();
        let mut ids: Vec<_> = second.iter().map(|t| t.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        let moved = second.iter().find(|t| t.id == 1).unwrap();
        assert_eq!(moved.bbox.x1, 104.0);
    }

    #[test]
    fn test_class_change_starts_new_track() {
        let mut tracker = IouTracker::default();
        tracker.update(&frame(), &[det(100.0, 100.0, 0)]).unwrap();
        let tracks = tracker.update(&frame(), &[det(100.0, 100.0, 1)]).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, 2);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut tracker = IouTracker::new(IouTrackerConfig {
            max_age: 0,
            ..Default::default()
        });
        tracker.update(&frame(), &[det(100.0, 100.0, 0)]).unwrap();
        tracker.update(&frame(), &[]).unwrap();
        assert_eq!(tracker.live_tracks(), 0);

        let tracks = tracker.update(&frame(), &[det(100.0, 100.0, 0)]).unwrap();
        assert_eq!(tracks[0].id, 2);
    }

    #[test]
    fn test_missed_track_not_reported_but_kept() {
        let mut tracker = IouTracker::default();
        tracker.update(&frame(), &[det(100.0, 100.0, 0)]).unwrap();

        let tracks = tracker.update(&frame(), &[]).unwrap();
        assert!(tracks.is_empty());
        assert_eq!(tracker.live_tracks(), 1);

        let tracks = tracker.update(&frame(), &[det(102.0, 100.0, 0)]).unwrap();
        assert_eq!(tracks[0].id, 1);
    }

    #[test]
    fn test_min_hits_delays_reporting() {
        let mut tracker = IouTracker::new(IouTrackerConfig {
            min_hits: 2,
            ..Default::default()
        });
        assert!(tracker.update(&frame(), &[det(0.0, 0.0, 0)]).unwrap().is_empty());
        assert_eq!(tracker.update(&frame(), &[det(1.0, 0.0, 0)]).unwrap().len(), 1);
    }
}
