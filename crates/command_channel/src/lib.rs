//! # Command Channel
//!
//! Operator commands against the vehicle.
//!
//! - Tracks every submitted command as a [`CommandTask`]
//! - Resolves object-relative commands against the latest snapshot
//! - Forwards the supported commands to a [`VehicleLink`]
//!
//! ## Example
//!
//! ```ignore
//! use command_channel::{CommandChannel, MockVehicleLink};
//!
//! let channel = CommandChannel::new(Arc::new(link), analysis.snapshots());
//! let task = channel.dispatch(Command::SetRoiObject { track_id: 3 }).await?;
//! ```

mod channel;
mod error;
mod link;
mod mock;

pub use channel::CommandChannel;
pub use error::{CommandError, Result};
pub use link::{LocalVehicleLink, VehicleLink};
pub use mock::{LinkCall, MockVehicleLink};

pub use contracts::{Command, CommandKind, CommandStatus, CommandTask, RawCommand, TaskId};
