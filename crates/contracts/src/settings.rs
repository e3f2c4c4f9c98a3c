//! Runtime-adjustable detection settings

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ClassId, ContractError};

/// Detection settings, adjustable while the analysis loop runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DetectionSettings {
    /// Minimum detection confidence
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// IoU threshold used by the detector's non-maximum suppression
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Maximum detections per frame
    #[validate(range(min = 1))]
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,

    /// Class ids never reported
    #[serde(default)]
    pub excluded_classes: BTreeSet<ClassId>,
}

fn default_confidence_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.5
}

fn default_max_detections() -> usize {
    10
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            iou_threshold: default_iou_threshold(),
            max_detections: default_max_detections(),
            excluded_classes: BTreeSet::new(),
        }
    }
}

impl DetectionSettings {
    /// Validate ranges, reporting the first offending field
    pub fn check(&self) -> Result<(), ContractError> {
        if let Some(field) = self.non_finite_threshold() {
            return Err(ContractError::config_validation(
                field,
                format!("{field} must be a number within [0, 1]"),
            ));
        }
        self.validate().map_err(|errors| {
            let field = errors
                .field_errors()
                .keys()
                .next()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "analysis".to_string());
            ContractError::config_validation(field, errors.to_string())
        })
    }

    /// First threshold holding NaN or an infinity
    ///
    /// `range` validation compares with `<` and `>`, which NaN passes.
    pub fn non_finite_threshold(&self) -> Option<&'static str> {
        if !self.confidence_threshold.is_finite() {
            Some("confidence_threshold")
        } else if !self.iou_threshold.is_finite() {
            Some("iou_threshold")
        } else {
            None
        }
    }

    /// Classes the detector may report, given its full class list.
    ///
    /// `None` means "no restriction".
    pub fn allowed_classes(&self, available: &[ClassId]) -> Option<BTreeSet<ClassId>> {
        if self.excluded_classes.is_empty() {
            return None;
        }
        Some(
            available
                .iter()
                .copied()
                .filter(|c| !self.excluded_classes.contains(c))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DetectionSettings::default().check().is_ok());
    }

    #[test]
    fn test_confidence_out_of_range() {
        let settings = DetectionSettings {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        let err = settings.check().unwrap_err().to_string();
        assert!(err.contains("confidence_threshold"), "got: {err}");
    }

    #[test]
    fn test_nan_thresholds_rejected() {
        let settings = DetectionSettings {
            confidence_threshold: f32::NAN,
            ..Default::default()
        };
        let err = settings.check().unwrap_err().to_string();
        assert!(err.contains("confidence_threshold"), "got: {err}");

        let settings = DetectionSettings {
            iou_threshold: f32::INFINITY,
            ..Default::default()
        };
        let err = settings.check().unwrap_err().to_string();
        assert!(err.contains("iou_threshold"), "got: {err}");
    }

    #[test]
    fn test_zero_max_detections_rejected() {
        let settings = DetectionSettings {
            max_detections: 0,
            ..Default::default()
        };
        assert!(settings.check().is_err());
    }

    #[test]
    fn test_allowed_classes() {
        let settings = DetectionSettings {
            excluded_classes: BTreeSet::from([2, 5]),
            ..Default::default()
        };
        let allowed = settings.allowed_classes(&[0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(allowed, BTreeSet::from([0, 1, 3, 4]));

        assert!(DetectionSettings::default()
            .allowed_classes(&[0, 1])
            .is_none());
    }
}
