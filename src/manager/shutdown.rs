//! Bounded, idempotent shutdown.
//!
//! Shutdown cancels every live task through the root token, then waits up
//! to a single wall-clock budget for the active partition to drain. Work
//! that ignores its token is flagged in diagnostics rather than hidden;
//! the call itself always returns within the budget.

use super::core::{ManagerInner, TaskManager};
use super::events::TaskEvent;
use super::task::TaskId;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of a shutdown sequence.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Tasks that were live when shutdown began and reached a terminal
    /// state within the budget.
    pub completed: Vec<TaskId>,

    /// Tasks still live when the budget expired.
    pub timed_out: Vec<TaskId>,
}

impl ShutdownReport {
    /// Returns true if every live task drained within the budget.
    pub fn all_completed(&self) -> bool {
        self.timed_out.is_empty()
    }
}

impl TaskManager {
    /// Shuts the manager down, waiting at most `timeout` for live tasks.
    ///
    /// Idempotent: the first caller runs the sequence; concurrent or
    /// later callers await the same run and receive the same report (the
    /// later arguments are ignored). From the moment shutdown begins,
    /// submissions fail with `ShuttingDown`.
    ///
    /// With `graceful` set, workers that outlive the budget are left to
    /// finish on their own (they stay flagged in diagnostics). Without
    /// it, those workers are additionally abandoned once the budget has
    /// expired. Cancellation is requested the same way in both modes.
    pub async fn shutdown(&self, graceful: bool, timeout: Duration) -> ShutdownReport {
        let inner = Arc::clone(&self.inner);
        self.inner
            .shutdown_cell
            .get_or_init(|| run_shutdown(inner, graceful, timeout))
            .await
            .clone()
    }

    /// Shuts down gracefully with the configured default budget.
    pub async fn shutdown_graceful(&self) -> ShutdownReport {
        let timeout = self.inner.config.shutdown_timeout;
        self.shutdown(true, timeout).await
    }
}

async fn run_shutdown(
    inner: Arc<ManagerInner>,
    graceful: bool,
    timeout: Duration,
) -> ShutdownReport {
    inner.shutting_down.store(true, Ordering::SeqCst);

    let (live, mut count_rx) = {
        let registry = inner.registry();
        (registry.active_ids(), registry.subscribe_active_count())
    };

    info!(
        live = live.len(),
        graceful,
        timeout_ms = timeout.as_millis(),
        "Shutdown requested; cancelling live tasks"
    );

    // Every task token is a child of the root, so one cancel latches all
    // of them, including tasks racing past the submit gate right now.
    inner.root_token.cancel();

    let drained = tokio::time::timeout(timeout, count_rx.wait_for(|count| *count == 0))
        .await
        .is_ok();

    let timed_out = if drained {
        Vec::new()
    } else {
        inner.registry().flag_shutdown_timeouts(!graceful)
    };

    for id in &timed_out {
        warn!(task_id = %id, "Task did not stop within the shutdown budget");
        inner.events.emit(TaskEvent::ShutdownTimedOut { id: *id });
    }

    let mut completed: Vec<TaskId> = live
        .into_iter()
        .filter(|id| !timed_out.contains(id))
        .collect();
    completed.sort();

    info!(
        completed = completed.len(),
        timed_out = timed_out.len(),
        "Shutdown complete"
    );

    ShutdownReport {
        completed,
        timed_out,
    }
}
