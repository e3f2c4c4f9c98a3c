//! Vehicle telemetry values - Ingestion output
//!
//! Every value is `Copy`: readers always get their own copy of a complete sample.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vehicle body orientation (radians)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Camera mount orientation relative to the body (radians)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GimbalOrientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl GimbalOrientation {
    /// Convert a gimbal attitude quaternion (w, x, y, z) into Z-Y-X Euler angles.
    pub fn from_quaternion(w: f64, x: f64, y: f64, z: f64) -> Self {
        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        Self { roll, pitch, yaw }
    }
}

/// Vehicle world position and heading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalPosition {
    /// Latitude (degrees)
    pub latitude: f64,

    /// Longitude (degrees)
    pub longitude: f64,

    /// Altitude (metres, same datum as the terrain model)
    pub altitude: f64,

    /// Heading (radians, clockwise from north)
    pub heading: f64,
}

/// The three freshest telemetry values, read together for one iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub attitude: Attitude,
    pub position: GlobalPosition,
    pub gimbal: GimbalOrientation,
}

/// A single decoded sample emitted by the vehicle link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum TelemetrySample {
    Attitude(Attitude),
    Position(GlobalPosition),
    Gimbal(GimbalOrientation),
}

impl TelemetrySample {
    /// Channel this sample belongs to
    pub fn channel(&self) -> TelemetryChannel {
        match self {
            Self::Attitude(_) => TelemetryChannel::Attitude,
            Self::Position(_) => TelemetryChannel::Position,
            Self::Gimbal(_) => TelemetryChannel::Gimbal,
        }
    }
}

/// Telemetry channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryChannel {
    Attitude,
    Position,
    Gimbal,
}

impl TelemetryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attitude => "attitude",
            Self::Position => "position",
            Self::Gimbal => "gimbal",
        }
    }
}

impl fmt::Display for TelemetryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
