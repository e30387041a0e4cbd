//! The background execution seam
//!
//! A [`BackgroundExecutor`] runs one task computation off the caller's path.
//! The orchestrator only needs it to eventually resolve with a result or a
//! [`WorkerError`]; how and where the work runs is up to the implementation.

use crate::reducer::SettlementError;
use async_trait::async_trait;
use esoworker_core::{TaskId, UNKNOWN_WORKER_ERROR};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Failure reported by a background executor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// The computation failed, possibly without a usable message
    #[error("{}", .message.as_deref().filter(|m| !m.is_empty()).unwrap_or(UNKNOWN_WORKER_ERROR))]
    Failed { message: Option<String> },

    /// The computation observed its cancellation token and gave up
    #[error("task was cancelled")]
    Cancelled,
}

impl WorkerError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: Some(message.into()),
        }
    }

    /// A failure that carries no message
    #[must_use]
    pub fn unknown() -> Self {
        Self::Failed { message: None }
    }

    /// Convert into the outcome recorded in task state.
    ///
    /// Missing or empty messages fall back to `"Unknown worker error"`.
    pub fn classify(&self) -> SettlementError {
        match self {
            Self::Cancelled => SettlementError::Cancelled,
            Self::Failed { message } => SettlementError::Failed(
                message
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(UNKNOWN_WORKER_ERROR)
                    .to_string(),
            ),
        }
    }

    /// Map a join failure of a spawned computation
    pub fn from_join_error(error: JoinError) -> Self {
        if error.is_cancelled() {
            return Self::Cancelled;
        }
        match error.try_into_panic() {
            Ok(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned());
                Self::Failed { message }
            }
            Err(_) => Self::unknown(),
        }
    }
}

impl From<anyhow::Error> for WorkerError {
    fn from(error: anyhow::Error) -> Self {
        Self::failed(format!("{error:#}"))
    }
}

/// Progress callback handed to an executor.
///
/// Reports are dropped once the associated request has been cancelled.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(f64) + Send + Sync>,
    cancel: CancellationToken,
}

impl ProgressReporter {
    pub fn new(cancel: CancellationToken, sink: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            cancel,
        }
    }

    /// Reporter that discards everything
    pub fn noop() -> Self {
        Self::new(CancellationToken::new(), |_| {})
    }

    pub fn report(&self, progress: f64) {
        if self.cancel.is_cancelled() {
            return;
        }
        (self.sink)(progress);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Runs task computations in the background
#[async_trait]
pub trait BackgroundExecutor<I, R>: Send + Sync
where
    I: Send + 'static,
    R: Send + 'static,
{
    /// Run `task_id` on `input`.
    ///
    /// Implementations should check `cancel` where convenient; the
    /// orchestrator stops listening as soon as it fires either way.
    async fn execute(
        &self,
        task_id: &TaskId,
        input: I,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<R, WorkerError>;
}

/// Adapter turning an async closure into a [`BackgroundExecutor`]
pub struct FnExecutor<I, R, F> {
    func: F,
    _types: PhantomData<fn(I) -> R>,
}

impl<I, R, F> FnExecutor<I, R, F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<I, R, F, Fut> BackgroundExecutor<I, R> for FnExecutor<I, R, F>
where
    I: Send + 'static,
    R: Send + 'static,
    F: Fn(TaskId, I, ProgressReporter, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, WorkerError>> + Send + 'static,
{
    async fn execute(
        &self,
        task_id: &TaskId,
        input: I,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<R, WorkerError> {
        (self.func)(task_id.clone(), input, progress, cancel).await
    }
}

/// Build an executor from an async closure
pub fn executor_fn<I, R, F, Fut>(func: F) -> Arc<dyn BackgroundExecutor<I, R>>
where
    I: Send + 'static,
    R: Send + 'static,
    F: Fn(TaskId, I, ProgressReporter, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, WorkerError>> + Send + 'static,
{
    Arc::new(FnExecutor::new(func))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_classify_failures() {
        assert_eq!(
            WorkerError::failed("boom").classify(),
            SettlementError::Failed("boom".into())
        );
        assert_eq!(
            WorkerError::unknown().classify(),
            SettlementError::Failed("Unknown worker error".into())
        );
        assert_eq!(
            WorkerError::failed("").classify(),
            SettlementError::Failed("Unknown worker error".into())
        );
        assert_eq!(WorkerError::Cancelled.classify(), SettlementError::Cancelled);
    }

    #[test]
    fn test_display_falls_back_to_unknown() {
        assert_eq!(WorkerError::unknown().to_string(), "Unknown worker error");
        assert_eq!(WorkerError::failed("x").to_string(), "x");
    }

    #[test]
    fn test_from_anyhow() {
        let error: WorkerError = anyhow::anyhow!("no fights in report").into();
        assert_eq!(error, WorkerError::failed("no fights in report"));
    }

    #[test]
    fn test_progress_reporter_silenced_after_cancel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let seen = Arc::clone(&calls);
        let reporter = ProgressReporter::new(token.clone(), move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(10.0);
        token.cancel();
        reporter.report(20.0);

        assert!(reporter.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_join_error_panic_message() {
        let handle = tokio::spawn(async { panic!("worker exploded") });
        let error = WorkerError::from_join_error(handle.await.unwrap_err());
        assert_eq!(error, WorkerError::failed("worker exploded"));
    }

    #[tokio::test]
    async fn test_executor_fn() {
        let executor = executor_fn(|task_id: TaskId, input: u32, _progress, _cancel| async move {
            Ok::<_, WorkerError>(format!("{task_id}:{input}"))
        });
        let out = executor
            .execute(
                &TaskId::from("double"),
                2,
                ProgressReporter::noop(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, "double:2");
    }
}
