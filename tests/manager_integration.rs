//! Integration tests for the task manager.
//!
//! These tests verify the complete orchestration workflow including:
//! - Submission, name deduplication and resubmission
//! - Snapshot consistency (terminal state and end timestamp together)
//! - Cooperative cancellation, both observed and ignored
//! - Bounded shutdown with unresponsive work
//! - History retention and eviction order
//! - Failure capture with backtraces and exactly-once notification

use groundtask::manager::{
    EventSink, ManagerConfig, SubmitError, TaskContext, TaskEvent, TaskManager, TaskStatus,
    WorkError, WorkResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

// =============================================================================
// Test Helpers
// =============================================================================

/// Sink that records every emitted event.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<TaskEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().expect("sink lock").clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TaskEvent) {
        self.events.lock().expect("sink lock").push(event);
    }
}

/// Work that completes once the notify fires, checking its token each
/// iteration.
fn gated_work(
    gate: Arc<Notify>,
) -> impl FnOnce(groundtask::manager::TaskContext) -> futures::future::BoxFuture<'static, WorkResult>
{
    move |ctx| {
        Box::pin(async move {
            loop {
                if ctx.is_cancelled() {
                    return WorkResult::Cancelled;
                }
                tokio::select! {
                    _ = gate.notified() => return WorkResult::Finished,
                    _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                }
            }
        })
    }
}

// =============================================================================
// Submission and Registry
// =============================================================================

#[tokio::test]
async fn test_every_submission_is_tracked() {
    let manager = TaskManager::new(ManagerConfig::default());

    let mut handles = Vec::new();
    for i in 0..5 {
        let handle = manager
            .submit(format!("track-{i}"), |_ctx| async { WorkResult::Finished })
            .expect("submit should succeed");
        handles.push(handle);
    }
    for handle in &mut handles {
        handle.wait().await;
    }

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 5);
    assert!(snapshot.active.is_empty());
    assert_eq!(snapshot.history.len(), 5);
}

#[tokio::test]
async fn test_duplicate_live_name_rejected_then_accepted() {
    let manager = TaskManager::new(ManagerConfig::default());
    let gate = Arc::new(Notify::new());

    let first = manager
        .submit("rotator-move", gated_work(Arc::clone(&gate)))
        .expect("first submit should succeed");

    let err = manager
        .submit("rotator-move", |_ctx| async { WorkResult::Finished })
        .expect_err("duplicate live name must be rejected");
    assert_eq!(
        err,
        SubmitError::AlreadyRunning {
            name: "rotator-move".to_string()
        }
    );

    gate.notify_one();
    let mut first = first;
    assert_eq!(first.wait().await, TaskStatus::Finished);

    // The name is free again once the first task is terminal.
    let mut second = manager
        .submit("rotator-move", |_ctx| async { WorkResult::Finished })
        .expect("resubmission should succeed");
    assert_eq!(second.wait().await, TaskStatus::Finished);
}

#[tokio::test]
async fn test_ended_at_iff_terminal_at_every_snapshot() {
    let manager = TaskManager::new(ManagerConfig::default());
    let gate = Arc::new(Notify::new());

    let handle = manager
        .submit("ephemeris-refresh", gated_work(Arc::clone(&gate)))
        .expect("submit should succeed");

    // While the task is live, no snapshot may show an end timestamp.
    for _ in 0..10 {
        let snapshot = manager.snapshot();
        for view in snapshot.active.iter().chain(snapshot.history.iter()) {
            assert_eq!(
                view.ended_at.is_some(),
                view.status.is_terminal(),
                "ended_at must be set exactly for terminal tasks"
            );
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    gate.notify_one();
    let mut handle = handle;
    handle.wait().await;

    let snapshot = manager.snapshot();
    let view = &snapshot.history[0];
    assert!(view.status.is_terminal());
    assert!(view.ended_at.is_some());
    assert!(view.duration.is_some());
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cooperative_cancellation() {
    let manager = TaskManager::new(ManagerConfig::default());

    let handle = manager
        .submit("polling-loop", |ctx: TaskContext| async move {
            loop {
                if ctx.is_cancelled() {
                    return WorkResult::Cancelled;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .expect("submit should succeed");

    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.cancel(handle.id());

    let mut handle = handle;
    assert_eq!(handle.wait().await, TaskStatus::Cancelled);

    let snapshot = manager.snapshot();
    let view = &snapshot.history[0];
    assert_eq!(view.status, TaskStatus::Cancelled);
    assert!(view.output.is_none());
    assert!(view.cancel_requested);
}

#[tokio::test]
async fn test_ignored_cancellation_still_latches() {
    let manager = TaskManager::new(ManagerConfig::default());

    let handle = manager
        .submit("stubborn", |_ctx| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            WorkResult::Finished
        })
        .expect("submit should succeed");

    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.cancel(handle.id());
    assert!(handle.is_cancelled(), "the token must latch immediately");

    // The work never checks the token, so it finishes normally; the
    // request does not relabel the outcome.
    let mut handle = handle;
    assert_eq!(handle.wait().await, TaskStatus::Finished);

    let view = &manager.snapshot().history[0];
    assert_eq!(view.status, TaskStatus::Finished);
    assert!(view.cancel_requested);
}

#[tokio::test]
async fn test_cancel_terminal_or_unknown_is_noop() {
    let manager = TaskManager::new(ManagerConfig::default());

    let mut handle = manager
        .submit("done", |_ctx| async { WorkResult::Finished })
        .expect("submit should succeed");
    handle.wait().await;

    // Cancelling a finished task changes nothing.
    manager.cancel(handle.id());
    assert_eq!(
        manager.snapshot().history[0].status,
        TaskStatus::Finished
    );
}

#[tokio::test]
async fn test_cancel_all_latches_every_live_task() {
    let manager = TaskManager::new(ManagerConfig::default());

    let handles: Vec<_> = (0..3)
        .map(|i| {
            manager
                .submit(format!("loop-{i}"), |ctx: TaskContext| async move {
                    ctx.cancellation_token().cancelled().await;
                    WorkResult::Cancelled
                })
                .expect("submit should succeed")
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    manager.cancel_all();

    for handle in handles {
        let mut handle = handle;
        assert_eq!(handle.wait().await, TaskStatus::Cancelled);
    }
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_bounded_with_unresponsive_task() {
    let manager = TaskManager::new(ManagerConfig::default());

    let responsive: Vec<_> = (0..2)
        .map(|i| {
            manager
                .submit(format!("responsive-{i}"), |ctx: TaskContext| async move {
                    ctx.cancellation_token().cancelled().await;
                    WorkResult::Cancelled
                })
                .expect("submit should succeed")
        })
        .collect();

    let stubborn = manager
        .submit("stubborn", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            WorkResult::Finished
        })
        .expect("submit should succeed");

    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    let report = manager.shutdown(true, Duration::from_millis(300)).await;
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(2),
        "shutdown must return within the budget, took {elapsed:?}"
    );

    let mut completed = report.completed.clone();
    completed.sort();
    let mut expected: Vec<_> = responsive.iter().map(|h| h.id()).collect();
    expected.sort();
    assert_eq!(completed, expected);
    assert_eq!(report.timed_out, vec![stubborn.id()]);
    assert!(!report.all_completed());

    // The straggler is flagged in diagnostics, not hidden.
    let snapshot = manager.snapshot();
    let view = snapshot
        .active
        .iter()
        .find(|v| v.id == stubborn.id())
        .expect("stubborn task must stay visible");
    assert!(view.timed_out_during_shutdown);
    assert_eq!(view.status, TaskStatus::Running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_shutdown_is_idempotent() {
    let manager = TaskManager::new(ManagerConfig::default());

    let _stuck = manager
        .submit("stuck", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            WorkResult::Finished
        })
        .expect("submit should succeed");

    tokio::time::sleep(Duration::from_millis(10)).await;

    let m1 = manager.clone();
    let m2 = manager.clone();
    let (r1, r2) = tokio::join!(
        m1.shutdown(true, Duration::from_millis(200)),
        m2.shutdown(false, Duration::from_millis(200)),
    );

    // One run, one report; the second caller's arguments are ignored.
    assert_eq!(r1.completed, r2.completed);
    assert_eq!(r1.timed_out, r2.timed_out);
    assert_eq!(r1.timed_out.len(), 1);
}

#[tokio::test]
async fn test_submit_rejected_after_shutdown() {
    let manager = TaskManager::new(ManagerConfig::default());
    manager.shutdown(true, Duration::from_millis(50)).await;

    let err = manager
        .submit("late", |_ctx| async { WorkResult::Finished })
        .expect_err("submission after shutdown must fail");
    assert_eq!(err, SubmitError::ShuttingDown);
    assert!(manager.is_shutting_down());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_with_drained_tasks_reports_completed() {
    let manager = TaskManager::new(ManagerConfig::default());

    let handle = manager
        .submit("cooperative", |ctx: TaskContext| async move {
            ctx.cancellation_token().cancelled().await;
            WorkResult::Cancelled
        })
        .expect("submit should succeed");

    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = manager.shutdown(true, Duration::from_secs(2)).await;
    assert!(report.all_completed());
    assert_eq!(report.completed, vec![handle.id()]);
}

// =============================================================================
// History Retention
// =============================================================================

#[tokio::test]
async fn test_history_retention_evicts_oldest() {
    let manager = TaskManager::new(ManagerConfig::default());

    for i in 0..250 {
        let mut handle = manager
            .submit(format!("sweep-{i:03}"), |_ctx| async { WorkResult::Finished })
            .expect("submit should succeed");
        handle.wait().await;
    }

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.history.len(), 200);

    // Most recent first; the 50 oldest completions were evicted.
    assert_eq!(snapshot.history[0].name, "sweep-249");
    assert_eq!(snapshot.history[199].name, "sweep-050");
    assert!(!snapshot
        .history
        .iter()
        .any(|view| view.name == "sweep-049"));
}

#[tokio::test]
async fn test_find_by_name_across_partitions() {
    let manager = TaskManager::new(ManagerConfig::default());

    let mut done = manager
        .submit("calibration", |_ctx| async { WorkResult::Finished })
        .expect("submit should succeed");
    done.wait().await;

    let gate = Arc::new(Notify::new());
    let live = manager
        .submit("calibration", gated_work(Arc::clone(&gate)))
        .expect("resubmission should succeed");

    let views = manager.find_by_name("calibration");
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].id, live.id());
    assert_eq!(views[1].id, done.id());

    gate.notify_one();
    let mut live = live;
    live.wait().await;
}

// =============================================================================
// Failure Capture
// =============================================================================

#[tokio::test]
async fn test_failing_work_records_trace_and_notifies_once() {
    let sink = Arc::new(RecordingSink::default());
    let manager = TaskManager::with_events(
        ManagerConfig::default(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
    );

    let mut handle = manager
        .submit("flaky-download", |_ctx| async {
            Err::<(), _>(WorkError::new("connection reset by peer"))
        })
        .expect("submit should succeed");
    assert_eq!(handle.wait().await, TaskStatus::Failed);

    let view = &manager.snapshot().history[0];
    let failure = view.failure.as_ref().expect("failure must be stored");
    assert!(failure.message.contains("connection reset"));
    assert!(!failure.trace.is_empty());

    let failed_events: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, TaskEvent::Failed { .. }) && e.task_id() == handle.id())
        .collect();
    assert_eq!(failed_events.len(), 1, "exactly one failure notification");
}

#[tokio::test]
async fn test_panicking_work_is_contained() {
    let sink = Arc::new(RecordingSink::default());
    let manager = TaskManager::with_events(
        ManagerConfig::default(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
    );

    let trigger = true;
    let mut panicking = manager
        .submit("decoder", move |_ctx| async move {
            if trigger {
                panic!("telemetry frame corrupted");
            }
            WorkResult::Finished
        })
        .expect("submit should succeed");

    // The panic is contained to its own task.
    assert_eq!(panicking.wait().await, TaskStatus::Failed);

    let mut healthy = manager
        .submit("healthy", |_ctx| async { WorkResult::Finished })
        .expect("the manager must survive a worker panic");
    assert_eq!(healthy.wait().await, TaskStatus::Finished);

    let snapshot = manager.snapshot();
    let failed = snapshot
        .history
        .iter()
        .find(|v| v.id == panicking.id())
        .expect("panicked task must be in history");
    let failure = failed.failure.as_ref().expect("failure must be stored");
    assert!(failure.message.contains("telemetry frame corrupted"));
    assert!(!failure.trace.is_empty());
}

#[tokio::test]
async fn test_event_stream_order_for_one_task() {
    let sink = Arc::new(RecordingSink::default());
    let manager = TaskManager::with_events(
        ManagerConfig::default(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
    );

    let mut handle = manager
        .submit("sequenced", |ctx: TaskContext| async move {
            ctx.report_progress("step 1");
            WorkResult::Finished
        })
        .expect("submit should succeed");
    handle.wait().await;

    let kinds: Vec<&'static str> = sink
        .events()
        .into_iter()
        .filter(|e| e.task_id() == handle.id())
        .map(|e| e.event_type())
        .collect();
    assert_eq!(kinds, vec!["submitted", "started", "progress", "finished"]);
}

// =============================================================================
// Blocking Work
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_work_runs_and_counts() {
    let manager = TaskManager::new(ManagerConfig::default());
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_clone = Arc::clone(&counter);
    let mut handle = manager
        .submit_blocking("antenna-park", move |ctx| {
            // Device I/O style body: blocks, polls the token between steps.
            for _ in 0..3 {
                if ctx.is_cancelled() {
                    return WorkResult::Cancelled;
                }
                std::thread::sleep(Duration::from_millis(5));
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }
            WorkResult::Finished
        })
        .expect("submit should succeed");

    assert_eq!(handle.wait().await, TaskStatus::Finished);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_work_panic_is_failed() {
    let manager = TaskManager::new(ManagerConfig::default());

    let trigger = true;
    let mut handle = manager
        .submit_blocking("fragile", move |_ctx| {
            if trigger {
                panic!("serial port wedged");
            }
            WorkResult::Finished
        })
        .expect("submit should succeed");

    assert_eq!(handle.wait().await, TaskStatus::Failed);
    let view = &manager.snapshot().history[0];
    let failure = view.failure.as_ref().expect("failure must be stored");
    assert!(failure.message.contains("serial port wedged"));
}
