//! LogSink - logs snapshot summaries via tracing

use contracts::{AnalysisSnapshot, ContractError, ResultSink};
use tracing::{debug, info, instrument, warn};

/// Sink that logs snapshot summaries
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_snapshot(&self, snapshot: &AnalysisSnapshot) {
        let position = &snapshot.vehicle_state.position;

        if let Some(failure) = &snapshot.stage_failure {
            warn!(
                sink = %self.name,
                sequence = snapshot.sequence,
                stage = failure.stage(),
                error = failure.message(),
                "Snapshot without tracks"
            );
        }

        info!(
            sink = %self.name,
            sequence = snapshot.sequence,
            timestamp = %snapshot.timestamp,
            frame = snapshot.camera_frame.sequence,
            tracks = snapshot.tracks.len(),
            latitude = position.latitude,
            longitude = position.longitude,
            altitude = position.altitude,
            "AnalysisSnapshot published"
        );

        for tracked in &snapshot.tracks {
            debug!(
                sink = %self.name,
                track_id = tracked.track.id,
                class_id = tracked.track.class_id,
                latitude = tracked.location.latitude,
                longitude = tracked.location.longitude,
                altitude = tracked.location.altitude,
                "Track located"
            );
        }
    }
}

impl ResultSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, sequence = snapshot.sequence)
    )]
    async fn write(&mut self, snapshot: &AnalysisSnapshot) -> Result<(), ContractError> {
        self.log_snapshot(snapshot);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
