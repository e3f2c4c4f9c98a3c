//! Feed traits - telemetry and video data source abstraction
//!
//! Decouples the acquisition cells from the concrete vehicle link / stream
//! receiver. Real and mock feeds implement the same callback interface.

use std::sync::Arc;

use crate::{CameraFrame, TelemetrySample};

/// Telemetry sample callback type
///
/// Uses `Arc` so the callback can be shared with the feed's own thread.
pub type TelemetryCallback = Arc<dyn Fn(TelemetrySample) + Send + Sync>;

/// Decoded frame callback type
pub type FrameCallback = Arc<dyn Fn(CameraFrame) + Send + Sync>;

/// Vehicle link telemetry feed
///
/// Emits attitude, global position and gimbal samples as they are decoded.
///
/// # Example
///
/// ```ignore
/// let feed: Box<dyn TelemetryFeed> = link.telemetry_feed();
/// feed.listen(Arc::new(|sample| {
///     println!("channel: {}", sample.channel());
/// }));
/// // ... use feed ...
/// feed.stop();
/// ```
pub trait TelemetryFeed: Send + Sync {
    /// Feed name
    fn name(&self) -> &str;

    /// Register the sample callback.
    ///
    /// Repeated calls while already listening are idempotent.
    fn listen(&self, callback: TelemetryCallback);

    /// Stop producing samples
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}

/// Video stream feed, emitting decoded frames with intrinsics
pub trait VideoFeed: Send + Sync {
    /// Feed name
    fn name(&self) -> &str;

    /// Register the frame callback (idempotent while listening)
    fn listen(&self, callback: FrameCallback);

    /// Stop producing frames
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
