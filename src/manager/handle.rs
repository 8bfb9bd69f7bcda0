//! Task handle for status queries and cancellation.
//!
//! A [`TaskHandle`] is returned by the submit paths. It carries the task
//! id, a status watch for non-blocking queries or awaiting completion,
//! and the task's cancellation token.

use super::task::{TaskId, TaskStatus};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Handle to a submitted task.
///
/// Cloneable; all clones refer to the same task. Dropping every handle
/// does not affect the task, which keeps running under the manager.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    name: String,
    status_rx: watch::Receiver<TaskStatus>,
    cancellation: CancellationToken,
}

impl TaskHandle {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        status_rx: watch::Receiver<TaskStatus>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            id,
            name,
            status_rx,
            cancellation,
        }
    }

    /// Returns the task's unique identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task's human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the most recent status without blocking.
    pub fn status(&self) -> TaskStatus {
        *self.status_rx.borrow()
    }

    /// Waits until the task reaches a terminal state and returns it.
    pub async fn wait(&mut self) -> TaskStatus {
        loop {
            let status = *self.status_rx.borrow();
            if status.is_terminal() {
                return status;
            }
            if self.status_rx.changed().await.is_err() {
                // Sender dropped; the last observed value is final.
                return *self.status_rx.borrow();
            }
        }
    }

    /// Requests cooperative cancellation of the task.
    ///
    /// Non-blocking; latches the token and returns. The task becomes
    /// `Cancelled` only if its work observes the token before finishing
    /// on its own.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns true if cancellation has been requested for this task.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}
