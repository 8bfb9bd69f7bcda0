//! The unit-of-work abstraction.
//!
//! Work is an opaque body the manager runs on a dedicated worker. It
//! receives a [`TaskContext`] for cancellation polling and progress
//! reporting, and resolves to a [`WorkResult`]. The manager never
//! inspects what the work computes.

use super::context::TaskContext;
use super::error::WorkError;
use super::output::TaskOutput;
use futures::future::BoxFuture;
use std::future::Future;

/// Outcome of a unit of work.
#[derive(Debug)]
pub enum WorkResult {
    /// Completed successfully with no payload.
    Finished,

    /// Completed successfully with an opaque payload.
    FinishedWithOutput(TaskOutput),

    /// The work failed.
    Failed(WorkError),

    /// The work observed its cancellation token and stopped early.
    Cancelled,
}

impl From<()> for WorkResult {
    fn from(_: ()) -> Self {
        Self::Finished
    }
}

impl From<TaskOutput> for WorkResult {
    fn from(output: TaskOutput) -> Self {
        Self::FinishedWithOutput(output)
    }
}

impl From<Result<(), WorkError>> for WorkResult {
    fn from(result: Result<(), WorkError>) -> Self {
        match result {
            Ok(()) => Self::Finished,
            Err(err) => Self::Failed(err),
        }
    }
}

impl From<Result<TaskOutput, WorkError>> for WorkResult {
    fn from(result: Result<TaskOutput, WorkError>) -> Self {
        match result {
            Ok(output) => Self::FinishedWithOutput(output),
            Err(err) => Self::Failed(err),
        }
    }
}

/// A unit of background work.
///
/// Implemented for any async closure taking a [`TaskContext`] and
/// resolving to something convertible into a [`WorkResult`], so plain
/// fallible bodies (`Result<TaskOutput, WorkError>`) compose with `?`.
///
/// Long-running bodies are expected to poll `ctx.is_cancelled()` at their
/// own cadence; the manager never pre-empts running work.
pub trait Work: Send + 'static {
    /// Consumes the work and returns its future.
    fn run(self: Box<Self>, ctx: TaskContext) -> BoxFuture<'static, WorkResult>;
}

impl<F, Fut, R> Work for F
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<WorkResult>,
{
    fn run(self: Box<Self>, ctx: TaskContext) -> BoxFuture<'static, WorkResult> {
        Box::pin(async move { (self)(ctx).await.into() })
    }
}

/// Adapter running a synchronous body on the blocking thread pool.
///
/// Hardware moves and other blocking I/O must not stall the async worker
/// threads, so the body is handed to `spawn_blocking`. Panics are caught
/// on the blocking thread itself so the panic hook's backtrace can be
/// attached.
pub(crate) struct BlockingWork<F> {
    f: F,
}

impl<F> BlockingWork<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, R> Work for BlockingWork<F>
where
    F: FnOnce(TaskContext) -> R + Send + 'static,
    R: Into<WorkResult> + Send + 'static,
{
    fn run(self: Box<Self>, ctx: TaskContext) -> BoxFuture<'static, WorkResult> {
        let f = self.f;
        Box::pin(async move {
            let outcome = tokio::task::spawn_blocking(move || {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (f)(ctx))) {
                    Ok(result) => result.into(),
                    Err(payload) => WorkResult::Failed(WorkError::from_panic(payload)),
                }
            })
            .await;

            match outcome {
                Ok(result) => result,
                Err(err) => WorkResult::Failed(WorkError::new(format!(
                    "blocking worker vanished: {err}"
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::task::TaskId;
    use tokio_util::sync::CancellationToken;

    fn test_context() -> TaskContext {
        TaskContext::detached(TaskId::next(), CancellationToken::new())
    }

    #[test]
    fn test_result_from_unit() {
        let result: WorkResult = ().into();
        assert!(matches!(result, WorkResult::Finished));
    }

    #[test]
    fn test_result_from_ok_output() {
        let mut output = TaskOutput::new();
        output.set("n", 1u32);
        let result: WorkResult = Ok::<_, WorkError>(output).into();
        assert!(matches!(result, WorkResult::FinishedWithOutput(_)));
    }

    #[test]
    fn test_result_from_err() {
        let result: WorkResult = Err::<(), _>(WorkError::new("nope")).into();
        match result {
            WorkResult::Failed(err) => assert_eq!(err.message(), "nope"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closure_is_work() {
        let work = |_ctx: TaskContext| async { WorkResult::Finished };
        let boxed: Box<dyn Work> = Box::new(work);
        let result = boxed.run(test_context()).await;
        assert!(matches!(result, WorkResult::Finished));
    }

    #[tokio::test]
    async fn test_fallible_closure_is_work() {
        let work = |_ctx: TaskContext| async { Err::<(), _>(WorkError::new("down")) };
        let boxed: Box<dyn Work> = Box::new(work);
        let result = boxed.run(test_context()).await;
        assert!(matches!(result, WorkResult::Failed(_)));
    }
}
