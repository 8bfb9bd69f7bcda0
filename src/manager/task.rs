//! Task identity and lifecycle states.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for allocating task identifiers.
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a submitted task.
///
/// Identifiers are allocated from a process-wide counter and never reused
/// for the lifetime of the process. The human-readable task name is
/// metadata and is not required to be unique; the id is what the manager
/// keys on.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocates the next unique task id.
    pub(crate) fn next() -> Self {
        Self(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value of this id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Task execution status.
///
/// The lifecycle is `Queued -> Running -> {Finished | Failed | Cancelled}`.
/// The three right-hand states are terminal; a task never transitions out
/// of a terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Registered but the worker has not started the body yet.
    #[default]
    Queued,

    /// The worker is executing the body.
    Running,

    /// Completed successfully.
    Finished,

    /// The work returned or raised a failure.
    Failed,

    /// The work observed its cancellation token and stopped.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the task has not yet reached a terminal state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Returns true if the task completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "Queued"),
            Self::Running => write!(f, "Running"),
            Self::Finished => write!(f, "Finished"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}
