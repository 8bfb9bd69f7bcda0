//! Internal runtime state of a tracked task.

use super::error::TaskFailure;
use super::output::TaskOutput;
use super::task::{TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Terminal outcome of a task.
#[derive(Debug, Clone)]
pub(crate) enum TaskOutcome {
    /// Successful completion with the work's payload.
    Finished(TaskOutput),
    /// The work failed; message plus captured backtrace.
    Failed(TaskFailure),
    /// The work observed cancellation and stopped.
    Cancelled,
}

/// Mutable runtime state of one submitted task.
///
/// Owned exclusively by the registry. Everything the presentation layer
/// sees is copied out into a view; nothing hands out references to this
/// struct.
#[derive(Debug, Clone)]
pub(crate) struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    pub tags: Vec<String>,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub outcome: Option<TaskOutcome>,
    /// Last reported progress message, overwritten on each report.
    pub progress: Option<String>,
    pub cancel_requested: bool,
    pub timed_out_during_shutdown: bool,
}

impl TaskRecord {
    pub fn new(id: TaskId, name: String, tags: Vec<String>) -> Self {
        Self {
            id,
            name,
            tags,
            status: TaskStatus::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            ended_at: None,
            duration: None,
            outcome: None,
            progress: None,
            cancel_requested: false,
            timed_out_during_shutdown: false,
        }
    }

    /// Marks the record as running.
    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Applies the terminal transition in one step.
    ///
    /// Status, outcome, end timestamp and duration are written together
    /// so no reader can observe a terminal status without its outcome.
    pub fn finalize(
        &mut self,
        status: TaskStatus,
        outcome: TaskOutcome,
        elapsed: Duration,
        cancel_requested: bool,
    ) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.outcome = Some(outcome);
        self.ended_at = Some(Utc::now());
        self.duration = Some(elapsed);
        self.cancel_requested = cancel_requested;
    }

    /// The instant used to order the active partition.
    pub fn start_key(&self) -> DateTime<Utc> {
        self.started_at.unwrap_or(self.submitted_at)
    }
}
