//! Lifecycle event notifications.
//!
//! The manager emits structured events through a sink abstraction and
//! does not know how they are consumed. Presentation layers that need
//! thread affinity subscribe through a [`ChannelEventSink`] and
//! redispatch received events onto their own event loop; the manager
//! itself has no UI-thread concept.
//!
//! Events for a given task are emitted by at most one execution context
//! at a time: `Submitted` is emitted before the worker is spawned, and
//! every later event for that task comes from its single worker. Terminal
//! events are emitted exactly once.

use super::output::TaskOutput;
use super::task::TaskId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Events emitted during task execution.
#[derive(Clone, Debug)]
pub enum TaskEvent {
    /// A task was accepted by the manager.
    Submitted {
        id: TaskId,
        name: String,
        tags: Vec<String>,
    },

    /// A worker picked up the task and is about to run the body.
    Started { id: TaskId },

    /// The work reported a progress message.
    Progress { id: TaskId, message: String },

    /// The task completed successfully.
    Finished {
        id: TaskId,
        output: TaskOutput,
        duration: Duration,
    },

    /// The task failed; carries the message and the captured backtrace.
    Failed {
        id: TaskId,
        error: String,
        trace: String,
        duration: Duration,
    },

    /// The task observed cancellation and stopped.
    Cancelled { id: TaskId, duration: Duration },

    /// The task was still live when the shutdown budget expired.
    ShutdownTimedOut { id: TaskId },
}

impl TaskEvent {
    /// Returns the task id this event belongs to.
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Submitted { id, .. }
            | Self::Started { id }
            | Self::Progress { id, .. }
            | Self::Finished { id, .. }
            | Self::Failed { id, .. }
            | Self::Cancelled { id, .. }
            | Self::ShutdownTimedOut { id } => *id,
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Started { .. } => "started",
            Self::Progress { .. } => "progress",
            Self::Finished { .. } => "finished",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
            Self::ShutdownTimedOut { .. } => "shutdown_timed_out",
        }
    }
}

// =============================================================================
// Event Sink Trait
// =============================================================================

/// Sink for task lifecycle events.
///
/// Implementations must be thread-safe; events may be emitted from any
/// worker. `emit` should be fast and non-blocking: buffer or hand off to
/// a channel rather than doing slow work inline.
pub trait EventSink: Send + Sync {
    /// Called for every lifecycle event.
    fn emit(&self, event: TaskEvent);
}

// =============================================================================
// Built-in Sink Implementations
// =============================================================================

/// No-op sink used when no consumer is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: TaskEvent) {
        // Intentionally empty
    }
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: TaskEvent) {
        match &event {
            TaskEvent::Submitted { id, name, tags } => {
                tracing::debug!(task_id = %id, name = %name, tags = ?tags, "Task submitted");
            }
            TaskEvent::Started { id } => {
                tracing::debug!(task_id = %id, "Task started");
            }
            TaskEvent::Progress { id, message } => {
                tracing::trace!(task_id = %id, message = %message, "Task progress");
            }
            TaskEvent::Finished { id, duration, .. } => {
                tracing::debug!(
                    task_id = %id,
                    duration_ms = duration.as_millis(),
                    "Task finished"
                );
            }
            TaskEvent::Failed {
                id,
                error,
                duration,
                ..
            } => {
                tracing::warn!(
                    task_id = %id,
                    error = %error,
                    duration_ms = duration.as_millis(),
                    "Task failed"
                );
            }
            TaskEvent::Cancelled { id, duration } => {
                tracing::debug!(
                    task_id = %id,
                    duration_ms = duration.as_millis(),
                    "Task cancelled"
                );
            }
            TaskEvent::ShutdownTimedOut { id } => {
                tracing::warn!(task_id = %id, "Task still live after shutdown budget");
            }
        }
    }
}

/// Sink that forwards events to multiple sinks.
pub struct MultiplexEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiplexEventSink {
    /// Creates a new multiplex sink with the given sinks.
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    /// Adds a sink to the multiplex.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for MultiplexEventSink {
    fn emit(&self, event: TaskEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

impl std::fmt::Debug for MultiplexEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexEventSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

/// Sink that pushes events into an unbounded channel.
///
/// This is the delivery mechanism for presentation layers: hold the
/// receiver on your own event loop and redispatch from there. Events
/// emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<TaskEvent>,
}

impl ChannelEventSink {
    /// Creates the sink and the receiver to drain it from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }
}
