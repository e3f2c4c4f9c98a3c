//! Per-sink delivery bookkeeping

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// What happened to one snapshot handed to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The sink accepted it; `located` tracks went out with it
    Written { sequence: u64, located: usize },
    /// The sink returned an error
    Failed,
    /// The queue was full when the dispatcher offered it
    Dropped,
}

/// Counters shared between a sink's handle and its worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    pending: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    located: AtomicU64,
    newest_written: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, delivery: Delivery) {
        match delivery {
            Delivery::Written { sequence, located } => {
                self.written.fetch_add(1, Ordering::Relaxed);
                self.located.fetch_add(located as u64, Ordering::Relaxed);
                self.newest_written.fetch_max(sequence, Ordering::Relaxed);
            }
            Delivery::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            Delivery::Dropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn set_pending(&self, pending: usize) {
        self.pending.store(pending, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.pending.load(Ordering::Relaxed),
            write_count: self.written.load(Ordering::Relaxed),
            failure_count: self.failed.load(Ordering::Relaxed),
            dropped_count: self.dropped.load(Ordering::Relaxed),
            located_count: self.located.load(Ordering::Relaxed),
            last_sequence: self.newest_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Snapshots waiting in the queue
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    /// Snapshots lost to a full queue
    pub dropped_count: u64,
    /// Located tracks carried by written snapshots
    pub located_count: u64,
    /// Newest snapshot written, 0 before the first write
    pub last_sequence: u64,
}

impl MetricsSnapshot {
    /// Snapshots the dispatcher offered to this sink
    pub fn offered(&self) -> u64 {
        self.write_count + self.failure_count + self.dropped_count
    }
}
