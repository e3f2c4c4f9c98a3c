//! # Ingestion Pipeline
//!
//! Telemetry and video acquisition.
//!
//! Responsibilities:
//! - Register telemetry / video feeds (mock and real share one interface)
//! - Keep only the freshest value per telemetry channel and the freshest frame
//! - Stamp frames with a per-source sequence number
//! - Count received samples
//!
//! Readers never block writers and never see a partially written value: each
//! cell swaps whole `Arc`s.
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockTelemetryFeed, MockVideoFeed};
//!
//! let mut pipeline = IngestionPipeline::new();
//! pipeline.register_telemetry_feed(Box::new(MockTelemetryFeed::hovering("link", 20.0, home)))?;
//! pipeline.register_video_feed(Box::new(MockVideoFeed::camera("cam", 10.0, 640, 480)))?;
//! pipeline.start_all();
//!
//! let telemetry = pipeline.telemetry().clone();
//! let state = telemetry.vehicle_state()?;
//! ```

mod cell;
mod error;
mod metrics;
mod mock;
mod pipeline;
mod telemetry;
mod video;

// Re-exports
pub use cell::LatestCell;
pub use error::{IngestionError, Result};
pub use crate::metrics::{IngestionMetrics, MetricsSnapshot};
pub use mock::{MockTelemetryConfig, MockTelemetryFeed, MockVideoConfig, MockVideoFeed};
pub use pipeline::IngestionPipeline;
pub use telemetry::TelemetrySource;
pub use video::VideoSource;
