//! Task execution context.
//!
//! The [`TaskContext`] is handed to each unit of work when it runs. It
//! provides cancellation polling and the progress side channel; the
//! actual registry mutation happens inside the manager on the work's
//! behalf, so work never touches shared state directly.

use super::core::ManagerInner;
use super::task::TaskId;
use std::sync::Weak;
use tokio_util::sync::CancellationToken;

/// Execution context passed to a unit of work.
///
/// Cloneable; all clones refer to the same task. Work should check
/// `is_cancelled()` periodically during long operations, or race its I/O
/// against `cancellation_token()` with `tokio::select!`.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    cancellation: CancellationToken,
    inner: Weak<ManagerInner>,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, cancellation: CancellationToken, inner: Weak<ManagerInner>) -> Self {
        Self {
            id,
            cancellation,
            inner,
        }
    }

    /// Builds a context that is not attached to a manager.
    ///
    /// Progress reports go nowhere; cancellation still works through the
    /// given token. Useful for exercising work bodies in isolation.
    #[allow(dead_code)]
    pub(crate) fn detached(id: TaskId, cancellation: CancellationToken) -> Self {
        Self {
            id,
            cancellation,
            inner: Weak::new(),
        }
    }

    /// Returns the id of the task this context belongs to.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns true if cancellation has been requested.
    ///
    /// The latch is one-way: once this returns true it never returns
    /// false again.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the cancellation token.
    ///
    /// Use with `tokio::select!` to race long awaits against cancellation.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Reports a progress message for this task.
    ///
    /// The message overwrites the previous one (no history is kept) and
    /// is re-emitted through the manager's event sink. Reports for a task
    /// that already reached a terminal state are dropped.
    pub fn report_progress(&self, message: impl Into<String>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.record_progress(self.id, message.into());
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}
