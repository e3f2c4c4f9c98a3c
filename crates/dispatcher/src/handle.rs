//! SinkHandle - one sink behind its own bounded queue and worker task
//!
//! The dispatcher only ever offers snapshots; a sink that falls behind loses
//! snapshots from its own queue and never delays the others.

use std::sync::Arc;

use contracts::{AnalysisSnapshot, ResultSink};
use observability::record_snapshot_dispatched;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::{Delivery, SinkMetrics};

type SnapshotQueue = mpsc::Receiver<Arc<AnalysisSnapshot>>;

/// Result of offering a snapshot to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// Queue full; the snapshot is lost for this sink
    Dropped,
    /// The worker is gone
    Closed,
}

/// A running sink
pub struct SinkHandle {
    name: String,
    queue: mpsc::Sender<Arc<AnalysisSnapshot>>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Move `sink` onto a worker task fed by a queue of `queue_capacity`
    pub fn spawn<S: ResultSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            sink,
            metrics: Arc::clone(&metrics),
            name: name.clone(),
        };

        Self {
            name,
            queue,
            metrics,
            worker: tokio::spawn(worker.run(rx)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a snapshot to the worker without waiting
    pub fn offer(&self, snapshot: Arc<AnalysisSnapshot>) -> Offer {
        match self.queue.try_send(snapshot) {
            Ok(()) => {
                let pending = self.queue.max_capacity() - self.queue.capacity();
                self.metrics.set_pending(pending);
                Offer::Queued
            }
            Err(mpsc::error::TrySendError::Full(skipped)) => {
                self.metrics.record(Delivery::Dropped);
                warn!(
                    sink = %self.name,
                    sequence = skipped.sequence,
                    "sink is behind, snapshot dropped"
                );
                Offer::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "sink worker is gone");
                Offer::Closed
            }
        }
    }

    /// Let the worker write what is queued, then flush and close the sink
    #[instrument(name = "sink_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
    }
}

struct SinkWorker<S> {
    sink: S,
    metrics: Arc<SinkMetrics>,
    name: String,
}

impl<S: ResultSink> SinkWorker<S> {
    #[instrument(name = "sink_worker", skip_all, fields(sink = %self.name))]
    async fn run(mut self, mut rx: SnapshotQueue) {
        debug!("sink worker started");
        while let Some(snapshot) = rx.recv().await {
            self.metrics.set_pending(rx.len());
            self.deliver(&snapshot).await;
        }
        self.finish().await;
    }

    async fn deliver(&mut self, snapshot: &AnalysisSnapshot) {
        let delivery = match self.sink.write(snapshot).await {
            Ok(()) => Delivery::Written {
                sequence: snapshot.sequence,
                located: snapshot.tracks.len(),
            },
            Err(e) => {
                error!(sequence = snapshot.sequence, error = %e, "snapshot not written");
                Delivery::Failed
            }
        };
        record_snapshot_dispatched(&self.name, delivery != Delivery::Failed);
        self.metrics.record(delivery);
    }

    async fn finish(mut self) {
        if let Err(e) = self.sink.flush().await {
            error!(error = %e, "flush at shutdown failed");
        }
        if let Err(e) = self.sink.close().await {
            error!(error = %e, "close at shutdown failed");
        }
        let totals = self.metrics.snapshot();
        debug!(
            written = totals.write_count,
            failed = totals.failure_count,
            dropped = totals.dropped_count,
            "sink worker stopped"
        );
    }
}
