//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::TelemetryChannel;

/// Ingestion metrics
///
/// Counters are also mirrored to the `metrics` facade so an installed
/// exporter sees them.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Attitude samples received
    pub attitude_samples: AtomicU64,

    /// Position samples received
    pub position_samples: AtomicU64,

    /// Gimbal samples received
    pub gimbal_samples: AtomicU64,

    /// Frames published
    pub frames_received: AtomicU64,

    /// Frames rejected as inconsistent
    pub frames_rejected: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a telemetry sample
    pub fn record_sample(&self, channel: TelemetryChannel) {
        let counter = match channel {
            TelemetryChannel::Attitude => &self.attitude_samples,
            TelemetryChannel::Position => &self.position_samples,
            TelemetryChannel::Gimbal => &self.gimbal_samples,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("geotrack_telemetry_samples_total", "channel" => channel.as_str())
            .increment(1);
    }

    /// Record a published frame
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("geotrack_frames_total").increment(1);
    }

    /// Record a rejected frame
    pub fn record_rejected_frame(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("geotrack_frames_rejected_total").increment(1);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attitude_samples: self.attitude_samples.load(Ordering::Relaxed),
            position_samples: self.position_samples.load(Ordering::Relaxed),
            gimbal_samples: self.gimbal_samples.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub attitude_samples: u64,
    pub position_samples: u64,
    pub gimbal_samples: u64,
    pub frames_received: u64,
    pub frames_rejected: u64,
}

impl MetricsSnapshot {
    /// Telemetry samples over all channels
    pub fn telemetry_samples(&self) -> u64 {
        self.attitude_samples + self.position_samples + self.gimbal_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_per_channel() {
        let metrics = IngestionMetrics::new();
        metrics.record_sample(TelemetryChannel::Attitude);
        metrics.record_sample(TelemetryChannel::Gimbal);
        metrics.record_sample(TelemetryChannel::Gimbal);
        metrics.record_frame();

        let snap = metrics.snapshot();
        assert_eq!(snap.attitude_samples, 1);
        assert_eq!(snap.position_samples, 0);
        assert_eq!(snap.gimbal_samples, 2);
        assert_eq!(snap.telemetry_samples(), 3);
        assert_eq!(snap.frames_received, 1);
    }
}
