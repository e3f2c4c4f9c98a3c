//! Scripted detector for running the loop without a model

use std::collections::BTreeSet;

use contracts::{
    BoundingBox, CameraFrame, ClassId, ContractError, Detection, DetectionParams, Detector,
};

/// Detector replaying a fixed script, one entry per call
///
/// The script cycles. Output is returned as scripted, without applying the
/// call parameters, so the caller's own filtering can be exercised.
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    name: String,
    class_ids: Vec<ClassId>,
    script: Vec<Vec<Detection>>,
    failing_calls: BTreeSet<usize>,
    calls: usize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        let class_ids: BTreeSet<ClassId> = script
            .iter()
            .flatten()
            .map(|d| d.class_id)
            .collect();
        Self {
            name: "scripted_detector".to_string(),
            class_ids: class_ids.into_iter().collect(),
            script,
            failing_calls: BTreeSet::new(),
            calls: 0,
        }
    }

    /// Same detections on every call
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self::new(vec![detections])
    }

    /// `targets` boxes sliding left to right across a `width`×`height` frame
    ///
    /// One script entry per frame, `frames` entries in total.
    pub fn drifting(targets: usize, width: u32, height: u32, frames: usize) -> Self {
        let w = width as f64;
        let h = height as f64;
        let size = (w.min(h) / 10.0).max(4.0);
        let lanes = targets.max(1) as f64;
        let frames = frames.max(1);

        let script = (0..frames)
            .map(|f| {
                let progress = f as f64 / frames as f64;
                (0..targets)
                    .map(|i| {
                        let x = progress * (w - size);
                        let y = (i as f64 + 0.5) / lanes * (h - size);
                        Detection {
                            bbox: BoundingBox::new(x, y, x + size, y + size),
                            score: 0.9,
                            class_id: (i % 3) as ClassId,
                        }
                    })
                    .collect()
            })
            .collect();

        let mut detector = Self::new(script);
        detector.class_ids = vec![0, 1, 2];
        detector
    }

    /// Override the reported class list
    pub fn with_class_ids(mut self, class_ids: Vec<ClassId>) -> Self {
        self.class_ids = class_ids;
        self
    }

    /// Fail on the given call (0-based)
    pub fn failing_on(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Calls made so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_ids(&self) -> Vec<ClassId> {
        self.class_ids.clone()
    }

    fn detect(
        &mut self,
        _frame: &CameraFrame,
        _params: &DetectionParams,
    ) -> Result<Vec<Detection>, ContractError> {
        let call = self.calls;
        self.calls += 1;

        if self.failing_calls.contains(&call) {
            return Err(ContractError::detection(
                &self.name,
                format!("scripted failure on call {call}"),
            ));
        }

        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.script[call % self.script.len()].clone())
    }
}
