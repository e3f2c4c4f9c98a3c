//! # Dispatcher
//!
//! Snapshot distribution.
//!
//! Responsibilities:
//! - follow the published `AnalysisSnapshot` cell
//! - fan out to multiple sinks
//! - isolate slow sinks so they never hold up the pipeline

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{AnalysisSnapshot, ResultSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig, SnapshotReceiver};
pub use error::DispatcherError;
pub use handle::{Offer, SinkHandle};
pub use metrics::{Delivery, MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, NetworkSink};
