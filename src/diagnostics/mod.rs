//! Read-only diagnostics views of the task registry.
//!
//! The presentation layer (diagnostics panel, log viewer) consumes these
//! snapshots; they are copies and share no state with the running
//! manager, so they can be read concurrently with execution without any
//! synchronization.
//!
//! # Example
//!
//! ```ignore
//! let snapshot = manager.snapshot();
//! for task in &snapshot.active {
//!     println!("{} [{}]", task.name, task.status);
//! }
//! println!("{}", snapshot);
//! ```

use crate::manager::{TaskFailure, TaskId, TaskOutput, TaskStatus};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Immutable copy of one task's state.
#[derive(Debug, Clone)]
pub struct TaskView {
    /// Stable task identifier.
    pub id: TaskId,
    /// Human-readable name; not required to be unique over time.
    pub name: String,
    /// Grouping tags supplied at submission.
    pub tags: Vec<String>,
    pub status: TaskStatus,
    /// Last reported progress message, if any.
    pub progress: Option<String>,
    pub submitted_at: DateTime<Utc>,
    /// Set when the worker picked the task up.
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly when the task reached a terminal state.
    pub ended_at: Option<DateTime<Utc>>,
    /// Measured execution time; set together with `ended_at`.
    pub duration: Option<Duration>,
    /// Success payload, present only for `Finished` tasks.
    pub output: Option<TaskOutput>,
    /// Failure message and captured backtrace, present only for `Failed`.
    pub failure: Option<TaskFailure>,
    /// True once cancellation was requested for this task.
    pub cancel_requested: bool,
    /// True if the task was still live when the shutdown budget expired.
    pub timed_out_during_shutdown: bool,
}

impl TaskView {
    /// Returns true if the task reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Snapshot of both registry partitions.
///
/// `active` is ordered by start time ascending, `history` by completion
/// time descending (most recent first).
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub active: Vec<TaskView>,
    pub history: Vec<TaskView>,
}

impl RegistrySnapshot {
    /// Total number of tasks in the snapshot.
    pub fn len(&self) -> usize {
        self.active.len() + self.history.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.history.is_empty()
    }

    /// Views of failed tasks across both partitions.
    pub fn failures(&self) -> Vec<&TaskView> {
        self.active
            .iter()
            .chain(self.history.iter())
            .filter(|view| view.failure.is_some())
            .collect()
    }
}

impl fmt::Display for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No task statistics available.");
        }

        writeln!(f, "Task diagnostics")?;
        writeln!(f, "================")?;

        if !self.active.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Active ({})", self.active.len())?;
            for view in &self.active {
                write_line(f, view)?;
            }
        }

        if !self.history.is_empty() {
            writeln!(f)?;
            writeln!(f, "## History ({})", self.history.len())?;
            for view in &self.history {
                write_line(f, view)?;
            }
        }

        Ok(())
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, view: &TaskView) -> fmt::Result {
    let duration = match view.duration {
        Some(d) => format!("{:.3}s", d.as_secs_f64()),
        None => "-".to_string(),
    };
    write!(
        f,
        "- {} ({}) [{}] duration={}",
        view.name, view.id, view.status, duration
    )?;
    if let Some(ref progress) = view.progress {
        write!(f, " progress={progress:?}")?;
    }
    if let Some(ref failure) = view.failure {
        write!(f, " error={:?}", failure.message)?;
    }
    if view.timed_out_during_shutdown {
        write!(f, " [timed out during shutdown]")?;
    }
    writeln!(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str, status: TaskStatus) -> TaskView {
        TaskView {
            id: TaskId::next(),
            name: name.to_string(),
            tags: vec![],
            status,
            progress: None,
            submitted_at: Utc::now(),
            started_at: None,
            ended_at: None,
            duration: None,
            output: None,
            failure: None,
            cancel_requested: false,
            timed_out_during_shutdown: false,
        }
    }

    #[test]
    fn test_empty_snapshot_display() {
        let snapshot = RegistrySnapshot::default();
        assert!(snapshot.is_empty());
        assert!(format!("{}", snapshot).contains("No task statistics"));
    }

    #[test]
    fn test_display_lists_partitions() {
        let snapshot = RegistrySnapshot {
            active: vec![view("rotator-move", TaskStatus::Running)],
            history: vec![view("catalog-sync", TaskStatus::Finished)],
        };

        let text = format!("{}", snapshot);
        assert!(text.contains("## Active (1)"));
        assert!(text.contains("## History (1)"));
        assert!(text.contains("rotator-move"));
        assert!(text.contains("[Finished]"));
    }

    #[test]
    fn test_failures_filter() {
        let mut failed = view("probe", TaskStatus::Failed);
        failed.failure = Some(TaskFailure {
            message: "device unreachable".to_string(),
            trace: "trace".to_string(),
        });

        let snapshot = RegistrySnapshot {
            active: vec![view("ok", TaskStatus::Running)],
            history: vec![failed],
        };

        let failures = snapshot.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "probe");
    }

    #[test]
    fn test_len() {
        let snapshot = RegistrySnapshot {
            active: vec![view("a", TaskStatus::Running)],
            history: vec![view("b", TaskStatus::Finished), view("c", TaskStatus::Cancelled)],
        };
        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot.is_empty());
    }
}
