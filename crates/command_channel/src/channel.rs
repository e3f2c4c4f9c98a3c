//! CommandChannel - task bookkeeping, resolution and dispatch

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{AnalysisSnapshot, Command, CommandStatus, CommandTask, RawCommand, TaskId};
use ingestion::LatestCell;
use observability::record_command;
use tracing::{debug, info, instrument, warn};

use crate::{CommandError, Result, VehicleLink};

/// Operator command channel
///
/// Commands run on demand; the channel itself owns no thread. Object-relative
/// commands are resolved against whatever snapshot is current when they
/// execute.
pub struct CommandChannel<L> {
    link: Arc<L>,
    snapshots: LatestCell<AnalysisSnapshot>,
    tasks: Mutex<BTreeMap<TaskId, CommandTask>>,
    next_id: AtomicU64,
}

impl<L> std::fmt::Debug for CommandChannel<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl<L: VehicleLink + Sync> CommandChannel<L> {
    pub fn new(link: Arc<L>, snapshots: LatestCell<AnalysisSnapshot>) -> Self {
        Self {
            link,
            snapshots,
            tasks: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn link(&self) -> &Arc<L> {
        &self.link
    }

    fn lock_tasks(&self) -> MutexGuard<'_, BTreeMap<TaskId, CommandTask>> {
        // a poisoned map is still consistent: every update is a single insert
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a command as a pending task
    pub fn submit(&self, command: Command) -> TaskId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_tasks().insert(
            id,
            CommandTask {
                id,
                command,
                status: CommandStatus::Pending,
            },
        );
        debug!(task = id, kind = %command.kind(), "command submitted");
        id
    }

    /// Parse and register a textual command
    pub fn submit_raw(&self, raw: RawCommand) -> Result<TaskId> {
        let command = Command::try_from(raw)?;
        Ok(self.submit(command))
    }

    /// Current status of a task
    pub fn status(&self, id: TaskId) -> Option<CommandStatus> {
        self.lock_tasks().get(&id).map(|t| t.status.clone())
    }

    /// All tasks, oldest first
    pub fn tasks(&self) -> Vec<CommandTask> {
        self.lock_tasks().values().cloned().collect()
    }

    fn transition(&self, id: TaskId, next: CommandStatus) -> Result<Command> {
        let mut tasks = self.lock_tasks();
        let task = tasks.get_mut(&id).ok_or(CommandError::UnknownTask(id))?;
        if !task.status.can_transition_to(&next) {
            return Err(CommandError::InvalidTransition {
                task: id,
                from: task.status.clone(),
                to: next,
            });
        }
        task.status = next;
        Ok(task.command)
    }

    /// Run a pending task to completion
    ///
    /// The task ends `Done` on success and `Failed` with the error text
    /// otherwise. Failures are not retried.
    #[instrument(name = "command_execute", skip(self))]
    pub async fn execute(&self, id: TaskId) -> Result<()> {
        let command = self.transition(id, CommandStatus::Running)?;

        // lock released: the link call may take a while
        let result = self.perform(command).await;

        let outcome = match &result {
            Ok(()) => CommandStatus::Done,
            Err(e) => CommandStatus::Failed {
                reason: e.to_string(),
            },
        };
        self.transition(id, outcome)?;
        record_command(command.kind().as_str(), result.is_ok());

        match &result {
            Ok(()) => info!(kind = %command.kind(), "command done"),
            Err(e) => warn!(kind = %command.kind(), error = %e, "command failed"),
        }
        result
    }

    /// Submit and execute in one step
    ///
    /// The task id is returned on success; on failure the task stays
    /// visible through [`CommandChannel::tasks`] with status `Failed`.
    pub async fn dispatch(&self, command: Command) -> Result<TaskId> {
        let id = self.submit(command);
        self.execute(id).await?;
        Ok(id)
    }

    /// Parse, submit and execute a textual command
    pub async fn dispatch_raw(&self, raw: RawCommand) -> Result<TaskId> {
        let command = Command::try_from(raw)?;
        self.dispatch(command).await
    }

    /// Rewrite an object-relative command to its location form
    ///
    /// Other commands pass through unchanged.
    ///
    /// # Errors
    /// Returns `CommandError::NotFound` when the track is not in the latest
    /// snapshot, or no snapshot has been published yet.
    pub fn resolve(&self, command: Command) -> Result<Command> {
        let Some(track_id) = command.object_track_id() else {
            return Ok(command);
        };

        let location = self
            .snapshots
            .latest()
            .and_then(|snapshot| snapshot.locate(track_id))
            .ok_or(CommandError::NotFound { track_id })?;

        debug!(track_id, ?location, "object command resolved");
        Ok(command.with_target(location))
    }

    async fn perform(&self, command: Command) -> Result<()> {
        let resolved = self.resolve(command)?;

        match resolved {
            Command::PointCamera { roll, pitch, yaw } => {
                self.link.set_gimbal_angles(roll, pitch, yaw).await
            }
            Command::SetRoi { target } => self.link.set_roi(target).await,
            Command::DisableRoi => self.link.disable_roi().await,
            other => Err(CommandError::NotImplemented { kind: other.kind() }),
        }
    }
}
