//! CameraFrame - VideoSource output
//!
//! One decoded image plus the camera intrinsics needed for projection.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Decoded camera frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFrame {
    /// Raw pixel data (zero-copy)
    pub pixels: Bytes,

    /// Image width (pixels)
    pub width: u32,

    /// Image height (pixels)
    pub height: u32,

    /// Pixel layout of `pixels`
    pub format: PixelFormat,

    /// Horizontal field of view (radians)
    pub fov_horizontal: f64,

    /// Publish sequence, assigned by the video source (monotonically increasing)
    #[serde(default)]
    pub sequence: u64,
}

impl CameraFrame {
    /// Create a frame; the sequence is assigned when the frame is published.
    pub fn new(
        pixels: Bytes,
        width: u32,
        height: u32,
        format: PixelFormat,
        fov_horizontal: f64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            fov_horizontal,
            sequence: 0,
        }
    }

    /// Vertical field of view, always derived from the horizontal one.
    pub fn fov_vertical(&self) -> f64 {
        vertical_fov(self.fov_horizontal, self.width, self.height)
    }

    /// Whether `pixels` holds exactly `width * height` pixels of `format`
    pub fn is_consistent(&self) -> bool {
        self.pixels.len()
            == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// `fovVertical = 2·atan(tan(fovHorizontal/2) · height/width)`
pub fn vertical_fov(fov_horizontal: f64, width: u32, height: u32) -> f64 {
    if width == 0 {
        return 0.0;
    }
    2.0 * ((fov_horizontal / 2.0).tan() * (height as f64 / width as f64)).atan()
}

/// Pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Rgb8,
    Rgba8,
    Bgr8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }
}
