//! Operator commands
//!
//! `Command` is the typed form; `RawCommand` is the textual form an operator
//! surface submits (`kind` plus upper-case argument names). Conversion
//! rejects unknown kinds and missing or malformed arguments up front.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GeoPoint, TrackId};

/// Command task identifier, unique within a CommandChannel
pub type TaskId = u64;

/// Vehicle command with typed arguments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Arm,
    Disarm,
    Takeoff {
        /// metres above home
        height: f64,
    },
    Land,
    /// Gimbal angles in radians
    PointCamera { roll: f64, pitch: f64, yaw: f64 },
    SetRoi { target: GeoPoint },
    DisableRoi,
    GoTo { target: GeoPoint },
    CircleAround { center: GeoPoint, radius: f64 },
    PointDrone { target: GeoPoint },

    // Object-relative forms, resolved against the latest snapshot
    SetRoiObject { track_id: TrackId },
    GoToObject { track_id: TrackId },
    CircleAroundObject { track_id: TrackId, radius: f64 },
    PointDroneObject { track_id: TrackId },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Arm => CommandKind::Arm,
            Self::Disarm => CommandKind::Disarm,
            Self::Takeoff { .. } => CommandKind::Takeoff,
            Self::Land => CommandKind::Land,
            Self::PointCamera { .. } => CommandKind::PointCamera,
            Self::SetRoi { .. } => CommandKind::SetRoi,
            Self::DisableRoi => CommandKind::DisableRoi,
            Self::GoTo { .. } => CommandKind::GoTo,
            Self::CircleAround { .. } => CommandKind::CircleAround,
            Self::PointDrone { .. } => CommandKind::PointDrone,
            Self::SetRoiObject { .. } => CommandKind::SetRoiObject,
            Self::GoToObject { .. } => CommandKind::GoToObject,
            Self::CircleAroundObject { .. } => CommandKind::CircleAroundObject,
            Self::PointDroneObject { .. } => CommandKind::PointDroneObject,
        }
    }

    /// Track id referenced by an object-relative command
    pub fn object_track_id(&self) -> Option<TrackId> {
        match self {
            Self::SetRoiObject { track_id }
            | Self::GoToObject { track_id }
            | Self::CircleAroundObject { track_id, .. }
            | Self::PointDroneObject { track_id } => Some(*track_id),
            _ => None,
        }
    }

    /// Rewrite an object-relative command to its coordinate form.
    ///
    /// Coordinate commands are returned unchanged.
    pub fn with_target(self, location: GeoPoint) -> Self {
        match self {
            Self::SetRoiObject { .. } => Self::SetRoi { target: location },
            Self::GoToObject { .. } => Self::GoTo { target: location },
            Self::CircleAroundObject { radius, .. } => Self::CircleAround {
                center: location,
                radius,
            },
            Self::PointDroneObject { .. } => Self::PointDrone { target: location },
            other => other,
        }
    }
}

/// Command kind without arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Arm,
    Disarm,
    Takeoff,
    Land,
    PointCamera,
    SetRoi,
    DisableRoi,
    GoTo,
    CircleAround,
    PointDrone,
    SetRoiObject,
    GoToObject,
    CircleAroundObject,
    PointDroneObject,
}

impl CommandKind {
    pub const ALL: [CommandKind; 14] = [
        Self::Arm,
        Self::Disarm,
        Self::Takeoff,
        Self::Land,
        Self::PointCamera,
        Self::SetRoi,
        Self::DisableRoi,
        Self::GoTo,
        Self::CircleAround,
        Self::PointDrone,
        Self::SetRoiObject,
        Self::GoToObject,
        Self::CircleAroundObject,
        Self::PointDroneObject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "ARM",
            Self::Disarm => "DISARM",
            Self::Takeoff => "TAKEOFF",
            Self::Land => "LAND",
            Self::PointCamera => "POINT_CAMERA",
            Self::SetRoi => "SET_ROI",
            Self::DisableRoi => "DISABLE_ROI",
            Self::GoTo => "GO_TO",
            Self::CircleAround => "CIRCLE_AROUND",
            Self::PointDrone => "POINT_DRONE",
            Self::SetRoiObject => "SET_ROI_OBJECT",
            Self::GoToObject => "GO_TO_OBJECT",
            Self::CircleAroundObject => "CIRCLE_AROUND_OBJECT",
            Self::PointDroneObject => "POINT_DRONE_OBJECT",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        // operator panels still send the camera-prefixed spelling
        if normalized == "SET_CAMERA_ROI_OBJECT" {
            return Ok(Self::SetRoiObject);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| CommandParseError::UnknownKind(s.to_string()))
    }
}

/// Errors converting a `RawCommand` into a `Command`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("unknown command kind '{0}'")]
    UnknownKind(String),

    #[error("{kind} requires argument '{argument}'")]
    MissingArgument {
        kind: CommandKind,
        argument: &'static str,
    },

    #[error("argument '{argument}' has invalid value '{value}'")]
    InvalidArgument {
        argument: &'static str,
        value: String,
    },
}

/// Argument names accepted in a `RawCommand`
pub mod arg {
    pub const HEIGHT: &str = "HEIGHT";
    pub const ROLL: &str = "ROLL";
    pub const PITCH: &str = "PITCH";
    pub const YAW: &str = "YAW";
    pub const OBJECT_ID: &str = "OBJECT_ID";
    pub const LATITUDE: &str = "LATITUDE";
    pub const LONGITUDE: &str = "LONGITUDE";
    pub const ALTITUDE: &str = "ALTITUDE";
    pub const DISTANCE: &str = "DISTANCE";
}

/// Textual command as submitted by an operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    pub kind: String,
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

impl RawCommand {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn arg(mut self, name: &str, value: impl ToString) -> Self {
        self.arguments
            .insert(name.to_ascii_uppercase(), value.to_string());
        self
    }

    fn number<T: FromStr>(
        &self,
        kind: CommandKind,
        name: &'static str,
    ) -> Result<T, CommandParseError> {
        let value = self
            .arguments
            .get(name)
            .ok_or(CommandParseError::MissingArgument {
                kind,
                argument: name,
            })?;
        value
            .trim()
            .parse()
            .map_err(|_| CommandParseError::InvalidArgument {
                argument: name,
                value: value.clone(),
            })
    }

    fn finite(&self, kind: CommandKind, name: &'static str) -> Result<f64, CommandParseError> {
        let v: f64 = self.number(kind, name)?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(CommandParseError::InvalidArgument {
                argument: name,
                value: v.to_string(),
            })
        }
    }

    fn geo_point(&self, kind: CommandKind) -> Result<GeoPoint, CommandParseError> {
        let point = GeoPoint::new(
            self.finite(kind, arg::LATITUDE)?,
            self.finite(kind, arg::LONGITUDE)?,
            self.finite(kind, arg::ALTITUDE)?,
        );
        if !point.is_valid() {
            return Err(CommandParseError::InvalidArgument {
                argument: arg::LATITUDE,
                value: format!("{}, {}", point.latitude, point.longitude),
            });
        }
        Ok(point)
    }

    fn radius(&self, kind: CommandKind) -> Result<f64, CommandParseError> {
        let radius = self.finite(kind, arg::DISTANCE)?;
        if radius <= 0.0 {
            return Err(CommandParseError::InvalidArgument {
                argument: arg::DISTANCE,
                value: radius.to_string(),
            });
        }
        Ok(radius)
    }
}

impl TryFrom<RawCommand> for Command {
    type Error = CommandParseError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let kind: CommandKind = raw.kind.parse()?;
        let command = match kind {
            CommandKind::Arm => Command::Arm,
            CommandKind::Disarm => Command::Disarm,
            CommandKind::Takeoff => {
                let height = raw.finite(kind, arg::HEIGHT)?;
                if height <= 0.0 {
                    return Err(CommandParseError::InvalidArgument {
                        argument: arg::HEIGHT,
                        value: height.to_string(),
                    });
                }
                Command::Takeoff { height }
            }
            CommandKind::Land => Command::Land,
            CommandKind::PointCamera => Command::PointCamera {
                roll: raw.finite(kind, arg::ROLL)?,
                pitch: raw.finite(kind, arg::PITCH)?,
                yaw: raw.finite(kind, arg::YAW)?,
            },
            CommandKind::SetRoi => Command::SetRoi {
                target: raw.geo_point(kind)?,
            },
            CommandKind::DisableRoi => Command::DisableRoi,
            CommandKind::GoTo => Command::GoTo {
                target: raw.geo_point(kind)?,
            },
            CommandKind::CircleAround => Command::CircleAround {
                center: raw.geo_point(kind)?,
                radius: raw.radius(kind)?,
            },
            CommandKind::PointDrone => Command::PointDrone {
                target: raw.geo_point(kind)?,
            },
            CommandKind::SetRoiObject => Command::SetRoiObject {
                track_id: raw.number(kind, arg::OBJECT_ID)?,
            },
            CommandKind::GoToObject => Command::GoToObject {
                track_id: raw.number(kind, arg::OBJECT_ID)?,
            },
            CommandKind::CircleAroundObject => Command::CircleAroundObject {
                track_id: raw.number(kind, arg::OBJECT_ID)?,
                radius: raw.radius(kind)?,
            },
            CommandKind::PointDroneObject => Command::PointDroneObject {
                track_id: raw.number(kind, arg::OBJECT_ID)?,
            },
        };
        Ok(command)
    }
}

/// Lifecycle state of a command task
///
/// Pending → Running → Done | Failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Running,
    Done,
    Failed { reason: String },
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: &CommandStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed { .. })
                | (Self::Running, Self::Done)
                | (Self::Running, Self::Failed { .. })
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Done => f.write_str("done"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// A submitted command and its current status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTask {
    pub id: TaskId,
    pub command: Command,
    pub status: CommandStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_camera() {
        let raw = RawCommand::new("POINT_CAMERA")
            .arg("roll", 0.0)
            .arg("pitch", -1.2)
            .arg("yaw", 0.5);
        let cmd = Command::try_from(raw).unwrap();
        assert_eq!(
            cmd,
            Command::PointCamera {
                roll: 0.0,
                pitch: -1.2,
                yaw: 0.5
            }
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = Command::try_from(RawCommand::new("SELF_DESTRUCT")).unwrap_err();
        assert_eq!(err, CommandParseError::UnknownKind("SELF_DESTRUCT".into()));
    }

    #[test]
    fn test_missing_argument() {
        let err = Command::try_from(RawCommand::new("TAKEOFF")).unwrap_err();
        assert!(matches!(
            err,
            CommandParseError::MissingArgument {
                argument: "HEIGHT",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_object_id() {
        let raw = RawCommand::new("GO_TO_OBJECT").arg(arg::OBJECT_ID, "seven");
        let err = Command::try_from(raw).unwrap_err();
        assert!(matches!(
            err,
            CommandParseError::InvalidArgument {
                argument: "OBJECT_ID",
                ..
            }
        ));
    }

    #[test]
    fn test_camera_roi_alias() {
        let raw = RawCommand::new("set_camera_roi_object").arg(arg::OBJECT_ID, 4);
        assert_eq!(
            Command::try_from(raw).unwrap(),
            Command::SetRoiObject { track_id: 4 }
        );
    }

    #[test]
    fn test_with_target_rewrites_object_kinds() {
        let here = GeoPoint::new(-35.0, 149.0, 600.0);
        assert_eq!(
            Command::GoToObject { track_id: 1 }.with_target(here),
            Command::GoTo { target: here }
        );
        assert_eq!(
            Command::CircleAroundObject {
                track_id: 1,
                radius: 30.0
            }
            .with_target(here),
            Command::CircleAround {
                center: here,
                radius: 30.0
            }
        );
        assert_eq!(Command::Land.with_target(here), Command::Land);
    }

    #[test]
    fn test_status_transitions() {
        assert!(CommandStatus::Pending.can_transition_to(&CommandStatus::Running));
        assert!(CommandStatus::Running.can_transition_to(&CommandStatus::Done));
        assert!(!CommandStatus::Done.can_transition_to(&CommandStatus::Running));
        assert!(!CommandStatus::Pending.can_transition_to(&CommandStatus::Done));
    }

    #[test]
    fn test_command_serde_tag() {
        let json = serde_json::to_string(&Command::DisableRoi).unwrap();
        assert_eq!(json, r#"{"kind":"DISABLE_ROI"}"#);
    }
}
