//! Worker routine and task lifecycle recording.
//!
//! Each submitted task runs as one spawned worker. The worker transitions
//! the record to `Running`, executes the body with panic containment, and
//! applies the terminal transition. Registry mutation happens under the
//! lock; notifications and log lines are emitted after it is released.

use super::core::ManagerInner;
use super::context::TaskContext;
use super::error::TaskFailure;
use super::events::TaskEvent;
use super::output::TaskOutput;
use super::record::{TaskOutcome, TaskRecord};
use super::task::{TaskId, TaskStatus};
use super::work::{Work, WorkResult};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Runs one unit of work to completion and records the outcome.
///
/// Failures are contained to this task: a panicking body is converted to
/// a `Failed` outcome and never unwinds into the manager or siblings.
pub(crate) async fn run_task(
    inner: Arc<ManagerInner>,
    id: TaskId,
    work: Box<dyn Work>,
    ctx: TaskContext,
) {
    inner.mark_running(id);
    let started = Instant::now();

    // A task cancelled while still queued never runs its body.
    let result = if ctx.is_cancelled() {
        WorkResult::Cancelled
    } else {
        match AssertUnwindSafe(work.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => WorkResult::Failed(super::error::WorkError::from_panic(payload)),
        }
    };

    inner.complete_task(id, result, started.elapsed());
}

impl ManagerInner {
    /// Transitions a task to `Running` and announces it.
    pub(crate) fn mark_running(&self, id: TaskId) {
        let found = self.registry().mark_running(id);
        if found {
            debug!(task_id = %id, "Task running");
            self.events.emit(TaskEvent::Started { id });
        }
    }

    /// Records a progress message on the work's behalf.
    ///
    /// Reports for unknown or already-terminal tasks are dropped.
    pub(crate) fn record_progress(&self, id: TaskId, message: String) {
        let found = self.registry().set_progress(id, message.clone());
        if found {
            self.events.emit(TaskEvent::Progress { id, message });
        }
    }

    /// Applies the terminal transition for a task and notifies consumers.
    pub(crate) fn complete_task(&self, id: TaskId, result: WorkResult, elapsed: Duration) {
        let (status, outcome) = match result {
            WorkResult::Finished => (
                TaskStatus::Finished,
                TaskOutcome::Finished(TaskOutput::new()),
            ),
            WorkResult::FinishedWithOutput(output) => {
                (TaskStatus::Finished, TaskOutcome::Finished(output))
            }
            WorkResult::Failed(err) => {
                (TaskStatus::Failed, TaskOutcome::Failed(TaskFailure::from(&err)))
            }
            WorkResult::Cancelled => (TaskStatus::Cancelled, TaskOutcome::Cancelled),
        };

        let record = self.registry().complete(id, status, outcome, elapsed);
        let Some(record) = record else {
            // Not live any more; nothing to record.
            return;
        };

        self.announce_completion(&record, elapsed);
    }

    /// Emits the terminal event and log line for a finalized record.
    fn announce_completion(&self, record: &TaskRecord, elapsed: Duration) {
        match (&record.status, &record.outcome) {
            (TaskStatus::Finished, Some(TaskOutcome::Finished(output))) => {
                info!(
                    task_id = %record.id,
                    name = %record.name,
                    duration_ms = elapsed.as_millis(),
                    "Task finished"
                );
                self.events.emit(TaskEvent::Finished {
                    id: record.id,
                    output: output.clone(),
                    duration: elapsed,
                });
            }
            (TaskStatus::Failed, Some(TaskOutcome::Failed(failure))) => {
                error!(
                    task_id = %record.id,
                    name = %record.name,
                    error = %failure.message,
                    duration_ms = elapsed.as_millis(),
                    "Task failed"
                );
                self.events.emit(TaskEvent::Failed {
                    id: record.id,
                    error: failure.message.clone(),
                    trace: failure.trace.clone(),
                    duration: elapsed,
                });
            }
            _ => {
                warn!(
                    task_id = %record.id,
                    name = %record.name,
                    duration_ms = elapsed.as_millis(),
                    "Task cancelled"
                );
                self.events.emit(TaskEvent::Cancelled {
                    id: record.id,
                    duration: elapsed,
                });
            }
        }
    }
}
