//! Runtime-adjustable detection settings

use std::sync::Arc;

use contracts::{ContractError, DetectionSettings};
use ingestion::LatestCell;
use tracing::info;

/// Shared handle to the detection settings read by the analysis loop
///
/// The loop reads the settings once at the start of every iteration, so an
/// update takes effect on the next iteration and never mid-way through one.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    cell: LatestCell<DetectionSettings>,
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(DetectionSettings::default())
    }
}

impl SettingsHandle {
    /// Create a handle holding `initial`
    ///
    /// `initial` is expected to be valid already (blueprints are validated
    /// on load); later changes go through [`SettingsHandle::update`].
    pub fn new(initial: DetectionSettings) -> Self {
        let cell = LatestCell::new();
        cell.publish(initial);
        Self { cell }
    }

    /// Current settings
    pub fn current(&self) -> Arc<DetectionSettings> {
        self.cell.latest().unwrap_or_default()
    }

    /// Replace the settings
    ///
    /// # Errors
    /// Returns `ContractError::ConfigValidation` for out-of-range values; the
    /// previous settings stay in place.
    pub fn update(&self, settings: DetectionSettings) -> Result<(), ContractError> {
        settings.check()?;
        info!(
            confidence_threshold = settings.confidence_threshold,
            iou_threshold = settings.iou_threshold,
            max_detections = settings.max_detections,
            excluded = settings.excluded_classes.len(),
            "detection settings updated"
        );
        self.cell.publish(settings);
        Ok(())
    }

    /// Apply `change` to a copy of the current settings and update
    pub fn modify(
        &self,
        change: impl FnOnce(&mut DetectionSettings),
    ) -> Result<(), ContractError> {
        let mut settings = (*self.current()).clone();
        change(&mut settings);
        self.update(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_valid_settings() {
        let handle = SettingsHandle::default();
        let reader = handle.clone();

        handle
            .modify(|s| {
                s.confidence_threshold = 0.7;
                s.excluded_classes.insert(3);
            })
            .unwrap();

        let current = reader.current();
        assert_eq!(current.confidence_threshold, 0.7);
        assert!(current.excluded_classes.contains(&3));
    }

    #[test]
    fn test_invalid_update_keeps_previous() {
        let handle = SettingsHandle::default();
        let err = handle
            .update(DetectionSettings {
                iou_threshold: -0.1,
                ..Default::default()
            })
            .unwrap_err();

        assert!(matches!(err, ContractError::ConfigValidation { .. }));
        assert_eq!(*handle.current(), DetectionSettings::default());
    }

    #[test]
    fn test_zero_max_detections_rejected() {
        let handle = SettingsHandle::default();
        assert!(handle.modify(|s| s.max_detections = 0).is_err());
        assert_eq!(handle.current().max_detections, 10);
    }

    #[test]
    fn test_nan_threshold_keeps_previous() {
        let handle = SettingsHandle::default();
        assert!(handle
            .modify(|s| s.confidence_threshold = f32::NAN)
            .is_err());
        assert_eq!(handle.current().confidence_threshold, 0.25);
    }
}
