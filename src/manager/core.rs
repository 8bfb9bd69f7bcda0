//! The task manager: construction, submission and cancellation.
//!
//! One long-lived [`TaskManager`] is constructed by the process entry
//! point and passed explicitly to every component that submits work.
//! There is no global instance.

use super::config::ManagerConfig;
use super::context::TaskContext;
use super::error::SubmitError;
use super::events::{EventSink, NullEventSink, TaskEvent};
use super::handle::TaskHandle;
use super::lifecycle;
use super::registry::Registry;
use super::shutdown::ShutdownReport;
use super::task::{TaskId, TaskStatus};
use super::work::{BlockingWork, Work, WorkResult};
use crate::diagnostics::{RegistrySnapshot, TaskView};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime;
use tokio::sync::{watch, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared state behind every [`TaskManager`] clone.
pub(crate) struct ManagerInner {
    pub(crate) config: ManagerConfig,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) events: Arc<dyn EventSink>,
    /// Root cancellation token; every task token is a child of it, so
    /// shutdown latches all of them with one cancel.
    pub(crate) root_token: CancellationToken,
    /// Raised at the start of shutdown; submissions fail from then on.
    pub(crate) shutting_down: AtomicBool,
    /// Holds the shutdown report; concurrent callers await the single run.
    pub(crate) shutdown_cell: OnceCell<ShutdownReport>,
    /// Runtime the workers are spawned on, captured at construction so
    /// control calls work from any thread.
    pub(crate) runtime: runtime::Handle,
}

impl ManagerInner {
    /// Locks the registry, recovering the data if a worker panicked while
    /// holding the lock.
    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Background task orchestrator.
///
/// Runs each submitted unit of work on its own worker, tracks lifecycle
/// state in the registry, and pushes notifications through the configured
/// [`EventSink`]. Cloneable; clones share the same manager.
///
/// `submit`, `cancel` and `snapshot` never block. [`TaskManager::shutdown`]
/// is the only awaiting call and is bounded by its timeout.
#[derive(Clone)]
pub struct TaskManager {
    pub(crate) inner: Arc<ManagerInner>,
}

impl TaskManager {
    /// Creates a manager with no event consumer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime; the manager captures the
    /// ambient runtime handle for spawning workers.
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_events(config, Arc::new(NullEventSink))
    }

    /// Creates a manager that pushes lifecycle events into `events`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_events(config: ManagerConfig, events: Arc<dyn EventSink>) -> Self {
        crate::panic::init();
        let registry = Registry::new(config.history_limit);
        Self {
            inner: Arc::new(ManagerInner {
                config,
                registry: Mutex::new(registry),
                events,
                root_token: CancellationToken::new(),
                shutting_down: AtomicBool::new(false),
                shutdown_cell: OnceCell::new(),
                runtime: runtime::Handle::current(),
            }),
        }
    }

    /// Submits a unit of work under the given name.
    ///
    /// Returns immediately with a handle carrying the new task's id.
    /// Fails with [`SubmitError::AlreadyRunning`] if a non-terminal task
    /// with the same name exists, or [`SubmitError::ShuttingDown`] once
    /// shutdown has begun.
    pub fn submit(
        &self,
        name: impl Into<String>,
        work: impl Work,
    ) -> Result<TaskHandle, SubmitError> {
        self.submit_boxed(name.into(), Vec::new(), Box::new(work))
    }

    /// Submits a unit of work with grouping tags.
    pub fn submit_tagged(
        &self,
        name: impl Into<String>,
        tags: Vec<String>,
        work: impl Work,
    ) -> Result<TaskHandle, SubmitError> {
        self.submit_boxed(name.into(), tags, Box::new(work))
    }

    /// Submits a synchronous body, run on the blocking thread pool.
    ///
    /// Use this for device I/O and other work that blocks the calling
    /// thread; the same submission contract as [`TaskManager::submit`]
    /// applies.
    pub fn submit_blocking<F, R>(
        &self,
        name: impl Into<String>,
        work: F,
    ) -> Result<TaskHandle, SubmitError>
    where
        F: FnOnce(TaskContext) -> R + Send + 'static,
        R: Into<WorkResult> + Send + 'static,
    {
        self.submit_boxed(name.into(), Vec::new(), Box::new(BlockingWork::new(work)))
    }

    /// Submits a synchronous body with grouping tags.
    pub fn submit_blocking_tagged<F, R>(
        &self,
        name: impl Into<String>,
        tags: Vec<String>,
        work: F,
    ) -> Result<TaskHandle, SubmitError>
    where
        F: FnOnce(TaskContext) -> R + Send + 'static,
        R: Into<WorkResult> + Send + 'static,
    {
        self.submit_boxed(name.into(), tags, Box::new(BlockingWork::new(work)))
    }

    fn submit_boxed(
        &self,
        name: String,
        tags: Vec<String>,
        work: Box<dyn Work>,
    ) -> Result<TaskHandle, SubmitError> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(SubmitError::ShuttingDown);
        }

        let id = TaskId::next();
        let token = self.inner.root_token.child_token();
        let (status_tx, status_rx) = watch::channel(TaskStatus::Queued);
        let record = super::record::TaskRecord::new(id, name.clone(), tags.clone());

        self.inner
            .registry()
            .try_insert(record, token.clone(), status_tx)?;

        info!(task_id = %id, name = %name, "Task submitted");
        self.inner
            .events
            .emit(TaskEvent::Submitted { id, name: name.clone(), tags });

        let ctx = TaskContext::new(id, token.clone(), Arc::downgrade(&self.inner));
        let join = self
            .inner
            .runtime
            .spawn(lifecycle::run_task(Arc::clone(&self.inner), id, work, ctx));
        self.inner.registry().attach_join(id, join);

        Ok(TaskHandle::new(id, name, status_rx, token))
    }

    /// Requests cooperative cancellation of one task.
    ///
    /// Non-blocking. A no-op when the task is unknown or already
    /// terminal: cancelling something that no longer exists is not an
    /// error.
    pub fn cancel(&self, id: TaskId) {
        let token = self.inner.registry().token_for(id);
        if let Some(token) = token {
            debug!(task_id = %id, "Cancellation requested");
            token.cancel();
        }
    }

    /// Requests cooperative cancellation of every live task.
    pub fn cancel_all(&self) {
        let tokens = self.inner.registry().active_tokens();
        info!(count = tokens.len(), "Cancelling all live tasks");
        for token in tokens {
            token.cancel();
        }
    }

    /// Returns an immutable snapshot of every tracked task.
    ///
    /// Safe to call from any thread, concurrently with execution; the
    /// views are copies and share no state with the registry.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.inner.registry().snapshot()
    }

    /// Finds tasks by name across active and history, most recent first.
    ///
    /// Names are metadata and not unique over time; this is the lookup
    /// for callers that track work by name rather than by id.
    pub fn find_by_name(&self, name: &str) -> Vec<TaskView> {
        self.inner.registry().find_by_name(name)
    }

    /// Drops the completed-task history. Live tasks are untouched.
    pub fn clear_history(&self) {
        self.inner.registry().clear_history();
        debug!("Task history cleared");
    }

    /// Returns true once shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("active", &self.inner.registry().active_len())
            .field("shutting_down", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}
