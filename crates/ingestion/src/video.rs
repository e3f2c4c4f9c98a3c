//! VideoSource - freshest decoded frame

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::CameraFrame;
use tokio::sync::watch;

use crate::cell::LatestCell;
use crate::error::{IngestionError, Result};

/// Latest decoded camera frame
///
/// The source stamps every accepted frame with a per-source sequence number,
/// starting at 1.
#[derive(Debug, Clone, Default)]
pub struct VideoSource {
    cell: LatestCell<CameraFrame>,
    sequence: Arc<AtomicU64>,
}

impl VideoSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame, returning the assigned sequence number
    ///
    /// # Errors
    /// `InconsistentFrame` when the pixel buffer does not match the declared
    /// size; the previous frame stays current.
    pub fn publish(&self, mut frame: CameraFrame) -> Result<u64> {
        if !frame.is_consistent() {
            return Err(IngestionError::InconsistentFrame {
                width: frame.width,
                height: frame.height,
                len: frame.pixels.len(),
            });
        }
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        frame.sequence = sequence;
        self.cell.publish(frame);
        Ok(sequence)
    }

    /// Freshest frame, `None` until the first publish
    pub fn latest(&self) -> Option<Arc<CameraFrame>> {
        self.cell.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<CameraFrame>>> {
        self.cell.subscribe()
    }

    /// Number of frames accepted so far
    pub fn published(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}
