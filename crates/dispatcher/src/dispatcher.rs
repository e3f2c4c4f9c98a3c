//! Dispatcher - follows the snapshot cell and fans out to sinks

use std::future::Future;
use std::sync::Arc;

use contracts::{AnalysisSnapshot, SinkConfig, SinkType};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Change feed of the published snapshot cell
pub type SnapshotReceiver = watch::Receiver<Option<Arc<AnalysisSnapshot>>>;

/// Sinks to start, in blueprint order
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Starts every sink before the dispatcher follows the snapshot cell
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input: SnapshotReceiver,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input: SnapshotReceiver) -> Self {
        Self { config, input }
    }

    /// Create every configured sink and start its worker
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;

        Ok(Dispatcher {
            handles,
            input: self.input,
        })
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            match create_sink_handle(sink_config).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // workers already started must not leak
                    for handle in handles {
                        handle.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, config.sink_type, e))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, config.sink_type, e))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Fans every newly published snapshot out to all sinks
///
/// Only the freshest snapshot is seen: if several are published between two
/// wake-ups, the intermediate ones are skipped, like any other reader of the
/// cell.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input: SnapshotReceiver,
}

impl Dispatcher {
    /// Follow `input` with sinks that are already running
    pub fn with_handles(handles: Vec<SinkHandle>, input: SnapshotReceiver) -> Self {
        Self { handles, input }
    }

    /// Metrics of every sink
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until `shutdown` resolves or the snapshot cell is dropped
    ///
    /// A snapshot published but not yet dispatched when `shutdown` fires is
    /// still delivered before the sinks are closed. Returns the final sink
    /// metrics, taken after every queue has drained.
    #[instrument(name = "dispatcher_run", skip_all)]
    pub async fn run<F>(mut self, shutdown: F) -> Vec<(String, MetricsSnapshot)>
    where
        F: Future<Output = ()>,
    {
        info!(sinks = self.handles.len(), "dispatching snapshots");
        tokio::pin!(shutdown);

        let mut snapshot_count: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if self.input.has_changed().unwrap_or(false) {
                        snapshot_count += self.dispatch_latest();
                    }
                    break;
                }
                changed = self.input.changed() => {
                    if changed.is_err() {
                        debug!("Snapshot cell dropped");
                        break;
                    }
                    snapshot_count += self.dispatch_latest();
                    if snapshot_count > 0 && snapshot_count.is_multiple_of(100) {
                        debug!(snapshots = snapshot_count, "Dispatcher progress");
                    }
                }
            }
        }

        info!(snapshots = snapshot_count, "Dispatcher shutting down");

        let counters: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect();
        Self::shutdown_handles(self.handles).await;

        info!("every sink drained and closed");
        counters
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect()
    }

    /// [`Dispatcher::run`] on its own task
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<Vec<(String, MetricsSnapshot)>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown))
    }

    fn dispatch_latest(&mut self) -> u64 {
        let latest = self.input.borrow_and_update().clone();
        match latest {
            Some(snapshot) => {
                for handle in &self.handles {
                    handle.offer(Arc::clone(&snapshot));
                }
                1
            }
            None => 0,
        }
    }

    async fn shutdown_handles(handles: Vec<SinkHandle>) {
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

/// Start the blueprint's sinks and attach them to the snapshot cell
#[instrument(name = "dispatcher_create", skip(sink_configs, input))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input: SnapshotReceiver,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input).build().await
}
