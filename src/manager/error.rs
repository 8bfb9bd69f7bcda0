//! Error types for submission and work failure.

use std::backtrace::Backtrace;
use std::error::Error;
use thiserror::Error;

/// Errors returned by the submit paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A non-terminal task with the same name already exists.
    ///
    /// The caller may retry once the live task reaches a terminal state,
    /// or pick a different name.
    #[error("a task named '{name}' is already running")]
    AlreadyRunning { name: String },

    /// Shutdown has begun; the manager no longer accepts work.
    #[error("the task manager is shutting down")]
    ShuttingDown,
}

/// Failure raised by a unit of work.
///
/// Captures a backtrace at construction so diagnostics always carry the
/// point of failure, not just the message. Panics inside work are
/// converted into a `WorkError` carrying the backtrace recorded by the
/// crate's panic hook.
#[derive(Debug)]
pub struct WorkError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl WorkError {
    /// Creates a failure with the given message, capturing a backtrace
    /// at the call site.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Creates a failure wrapping an underlying error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Builds a failure from a caught panic payload.
    ///
    /// Prefers the backtrace recorded by [`crate::panic`]'s hook on the
    /// panicking thread; falls back to capturing one at the catch site.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "worker panicked".to_string()
        };

        let backtrace = match crate::panic::take_captured() {
            Some(captured) => captured.backtrace,
            None => Backtrace::force_capture(),
        };

        Self {
            message: format!("panic: {message}"),
            source: None,
            backtrace,
        }
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the captured backtrace.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl std::fmt::Display for WorkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for WorkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn Error + 'static))
    }
}

impl From<String> for WorkError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for WorkError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// The failure stored on a task and carried by the failure notification.
///
/// This is the queryable form of a [`WorkError`]: the message (including
/// the source chain) plus the rendered backtrace.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Failure message, including any underlying cause.
    pub message: String,
    /// Rendered backtrace captured at the point of failure.
    pub trace: String,
}

impl From<&WorkError> for TaskFailure {
    fn from(err: &WorkError) -> Self {
        let message = match err.source.as_deref() {
            Some(source) => format!("{}: {}", err.message, source),
            None => err.message.clone(),
        };
        Self {
            message,
            trace: err.backtrace.to_string(),
        }
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_error_display() {
        let err = SubmitError::AlreadyRunning {
            name: "rotator-move".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "a task named 'rotator-move' is already running"
        );
        assert_eq!(
            format!("{}", SubmitError::ShuttingDown),
            "the task manager is shutting down"
        );
    }

    #[test]
    fn test_work_error_message() {
        let err = WorkError::new("device unreachable");
        assert_eq!(err.message(), "device unreachable");
        assert_eq!(format!("{}", err), "device unreachable");
    }

    #[test]
    fn test_work_error_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let err = WorkError::with_source("poll failed", io);

        let failure = TaskFailure::from(&err);
        assert!(failure.message.contains("poll failed"));
        assert!(failure.message.contains("read timed out"));
    }

    #[test]
    fn test_task_failure_trace_not_empty() {
        let err = WorkError::new("boom");
        let failure = TaskFailure::from(&err);
        assert!(!failure.trace.is_empty());
    }

    #[test]
    fn test_from_panic_payload_str() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad state");
        let err = WorkError::from_panic(payload);
        assert!(err.message().contains("bad state"));
    }
}
