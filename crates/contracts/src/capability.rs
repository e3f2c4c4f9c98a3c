//! External capabilities consumed by the analysis loop
//!
//! The detector and tracker are external collaborators; the pipeline only
//! depends on these traits.

use std::collections::BTreeSet;

use crate::{CameraFrame, ClassId, ContractError, Detection, DetectionSettings, Track};

/// Parameters for one detector call
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// `None` = every class allowed
    pub allowed_classes: Option<BTreeSet<ClassId>>,
}

impl DetectionParams {
    /// Build call parameters from the current settings and the detector's class list
    pub fn from_settings(settings: &DetectionSettings, available: &[ClassId]) -> Self {
        Self {
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            max_detections: settings.max_detections,
            allowed_classes: settings.allowed_classes(available),
        }
    }

    pub fn allows(&self, class_id: ClassId) -> bool {
        self.allowed_classes
            .as_ref()
            .map(|allowed| allowed.contains(&class_id))
            .unwrap_or(true)
    }
}

/// Object detector: frame → ordered detections.
///
/// Must be deterministic for identical inputs within a process.
pub trait Detector: Send {
    /// Detector name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Every class id the model can report
    fn class_ids(&self) -> Vec<ClassId>;

    /// Run detection on one frame
    ///
    /// # Errors
    /// Returns `ContractError::DetectionFailure` when inference fails
    fn detect(
        &mut self,
        frame: &CameraFrame,
        params: &DetectionParams,
    ) -> Result<Vec<Detection>, ContractError>;
}

/// Multi-object tracker: frame + detections → tracks with stable ids.
pub trait Tracker: Send {
    /// Tracker name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Feed one frame's detections, returning the tracks confirmed for it
    ///
    /// # Errors
    /// Returns `ContractError::TrackerFailure` when the update fails
    fn update(
        &mut self,
        frame: &CameraFrame,
        detections: &[Detection],
    ) -> Result<Vec<Track>, ContractError>;
}

/// Read-only elevation lookup. Implementations must be side-effect free.
pub trait TerrainModel: Send + Sync {
    /// Terrain elevation (metres) at a coordinate, `None` outside coverage
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64>;
}

impl<T: TerrainModel + ?Sized> TerrainModel for std::sync::Arc<T> {
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64> {
        (**self).elevation(latitude, longitude)
    }
}

impl<T: TerrainModel + ?Sized> TerrainModel for Box<T> {
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64> {
        (**self).elevation(latitude, longitude)
    }
}
