//! TelemetrySource - freshest attitude, position and gimbal values
//!
//! Each channel is an independent latest-value cell. Samples overwrite;
//! nothing is queued.

use contracts::{
    Attitude, ContractError, GimbalOrientation, GlobalPosition, TelemetryChannel,
    TelemetrySample, VehicleState,
};

use crate::cell::LatestCell;

/// Latest telemetry per channel
///
/// Cheap to clone; clones share the same cells.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySource {
    attitude: LatestCell<Attitude>,
    position: LatestCell<GlobalPosition>,
    gimbal: LatestCell<GimbalOrientation>,
}

impl TelemetrySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a decoded sample in its channel's cell
    pub fn ingest(&self, sample: TelemetrySample) {
        match sample {
            TelemetrySample::Attitude(v) => self.attitude.publish(v),
            TelemetrySample::Position(v) => self.position.publish(v),
            TelemetrySample::Gimbal(v) => self.gimbal.publish(v),
        }
    }

    pub fn latest_attitude(&self) -> Option<Attitude> {
        self.attitude.latest().map(|v| *v)
    }

    pub fn latest_position(&self) -> Option<GlobalPosition> {
        self.position.latest().map(|v| *v)
    }

    pub fn latest_gimbal(&self) -> Option<GimbalOrientation> {
        self.gimbal.latest().map(|v| *v)
    }

    /// Read all three channels for one analysis iteration
    ///
    /// # Errors
    /// `TelemetryUnavailable` naming the first channel that never reported
    pub fn vehicle_state(&self) -> Result<VehicleState, ContractError> {
        let attitude = self.latest_attitude().ok_or(ContractError::TelemetryUnavailable {
            channel: TelemetryChannel::Attitude,
        })?;
        let position = self.latest_position().ok_or(ContractError::TelemetryUnavailable {
            channel: TelemetryChannel::Position,
        })?;
        let gimbal = self.latest_gimbal().ok_or(ContractError::TelemetryUnavailable {
            channel: TelemetryChannel::Gimbal,
        })?;
        Ok(VehicleState {
            attitude,
            position,
            gimbal,
        })
    }
}
