//! Scripted operator commands
//!
//! A script is a JSON array of raw commands, each with an optional delay
//! relative to the previous one:
//!
//! ```json
//! [
//!   { "delay_ms": 2000, "kind": "SET_ROI_OBJECT", "arguments": { "OBJECT_ID": "1" } },
//!   { "delay_ms": 1000, "kind": "DISABLE_ROI" }
//! ]
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use command_channel::{CommandChannel, CommandStatus, RawCommand, VehicleLink};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{CliError, Result};

/// One step of a command script
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptedCommand {
    /// Wait before dispatching, counted from the previous step
    #[serde(default)]
    pub delay_ms: u64,

    #[serde(flatten)]
    pub command: RawCommand,
}

/// Read a command script from disk
pub fn load_script(path: &Path) -> Result<Vec<ScriptedCommand>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CliError::command_script(path, e))?;
    serde_json::from_str(&content).map_err(|e| CliError::command_script(path, e))
}

/// Dispatch every step in order
///
/// Failures are logged and do not stop the script.
pub async fn run_script<L>(channel: Arc<CommandChannel<L>>, script: Vec<ScriptedCommand>)
where
    L: VehicleLink + Send + Sync + 'static,
{
    for step in script {
        if step.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        }

        let kind = step.command.kind.clone();
        match channel.dispatch_raw(step.command).await {
            Ok(task) => info!(task, %kind, "Scripted command done"),
            Err(e) => warn!(%kind, error = %e, "Scripted command failed"),
        }
    }
}

/// Task outcomes of a command channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandReport {
    pub done: usize,
    pub failed: usize,
    /// Submitted but never finished (run interrupted)
    pub unfinished: usize,
}

impl CommandReport {
    pub fn from_channel<L: VehicleLink + Sync>(channel: &CommandChannel<L>) -> Self {
        let mut report = Self::default();
        for task in channel.tasks() {
            match task.status {
                CommandStatus::Done => report.done += 1,
                CommandStatus::Failed { .. } => report.failed += 1,
                CommandStatus::Pending | CommandStatus::Running => report.unfinished += 1,
            }
        }
        report
    }

    pub fn total(&self) -> usize {
        self.done + self.failed + self.unfinished
    }
}
