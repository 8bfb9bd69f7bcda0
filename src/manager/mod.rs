//! Background task manager.
//!
//! This module provides the orchestrator for background work: hardware
//! moves, downloads and catalog computations run as independent workers
//! while the interactive thread keeps polling a read-only snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TaskManager                           │
//! │  submit / cancel / shutdown / snapshot                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Registry    │  │ Workers     │  │ Event               │  │
//! │  │ active +    │  │ one tokio   │  │ Sink                │  │
//! │  │ history     │  │ task each   │  │                     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Work**: a unit of background work. It receives a [`TaskContext`]
//!   through which it polls for cancellation and reports progress, and
//!   returns a [`WorkResult`].
//!
//! - **Registry**: the single authoritative store of task state. Live
//!   tasks are tracked without bound; completed tasks are retained in a
//!   bounded history (oldest evicted first).
//!
//! - **Cancellation**: strictly cooperative. Each task owns a
//!   `CancellationToken` that is a child of the manager's root token, so
//!   shutdown latches every task with one call. A latched token is never
//!   reset.
//!
//! - **Events**: lifecycle notifications (submitted, started, progress,
//!   terminal outcome) are pushed through an [`EventSink`]. The manager
//!   has no notion of a UI thread; consumers that need one redispatch
//!   from their own event loop.
//!
//! # Example
//!
//! ```ignore
//! use groundtask::manager::{ManagerConfig, TaskManager, WorkResult};
//!
//! let manager = TaskManager::new(ManagerConfig::default());
//!
//! let handle = manager.submit("ephemeris-refresh", |ctx| async move {
//!     for body in catalog {
//!         if ctx.is_cancelled() {
//!             return WorkResult::Cancelled;
//!         }
//!         ctx.report_progress(format!("computing {body}"));
//!     }
//!     WorkResult::Finished
//! })?;
//!
//! let status = handle.wait().await;
//! ```
//!
//! # Shutdown
//!
//! [`TaskManager::shutdown`] cancels every live task and waits up to a
//! single wall-clock budget for workers to drain. Work that ignores its
//! token is flagged `timed_out_during_shutdown` in diagnostics rather
//! than hidden; shutdown itself always returns within the budget.

mod config;
mod context;
mod core;
mod error;
mod events;
mod handle;
mod lifecycle;
mod output;
mod record;
mod registry;
mod shutdown;
mod task;
mod work;

// Configuration
pub use config::{ManagerConfig, DEFAULT_HISTORY_LIMIT, DEFAULT_SHUTDOWN_TIMEOUT};

// Task identity and state machine
pub use task::{TaskId, TaskStatus};

// Work abstraction
pub use output::TaskOutput;
pub use work::{Work, WorkResult};

// Execution context
pub use context::TaskContext;

// Errors
pub use error::{SubmitError, TaskFailure, WorkError};

// Events
pub use events::{
    ChannelEventSink, EventSink, MultiplexEventSink, NullEventSink, TaskEvent, TracingEventSink,
};

// Handle
pub use handle::TaskHandle;

// Manager
pub use core::TaskManager;
pub use shutdown::ShutdownReport;
