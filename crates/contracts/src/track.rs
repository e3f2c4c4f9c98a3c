//! Detector and tracker outputs

use serde::{Deserialize, Serialize};

/// Detector class identifier
pub type ClassId = u32;

/// Persistent track identifier, never reused within one flight
pub type TrackId = u64;

/// Axis-aligned box in pixel coordinates (top-left / bottom-right)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box centre (px, py)
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Clamp the box into `[0,width]×[0,height]`
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = width as f64;
        let h = height as f64;
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// Raw detector output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,

    /// Confidence in [0, 1]
    pub score: f32,

    pub class_id: ClassId,
}

/// Detection resolved to a persistent identity across frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub bbox: BoundingBox,
    pub class_id: ClassId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let b = BoundingBox::new(100.0, 200.0, 300.0, 400.0);
        assert_eq!(b.center(), (200.0, 300.0));
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-12);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        // 50 / 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = BoundingBox::new(-5.0, 10.0, 700.0, 500.0).clamp_to(640, 480);
        assert_eq!(b, BoundingBox::new(0.0, 10.0, 640.0, 480.0));
    }
}
