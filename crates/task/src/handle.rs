//! Handles to dispatched executions

use crate::executor::WorkerError;
use esoworker_core::{RequestId, TaskId};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::fmt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why `execute_task` did not start any work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// A request for this task is already in flight
    AlreadyLoading,
    /// The current result was produced from the same input
    UpToDate,
}

/// How an `execute_task` call ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum TaskOutcome<R> {
    Skipped(SkipReason),
    /// Served from the result cache without running the executor
    CacheHit(R),
    Completed(R),
    Failed(String),
    Cancelled,
    /// A newer request became authoritative before this one settled
    Superseded,
}

impl<R> TaskOutcome<R> {
    pub fn result(&self) -> Option<&R> {
        match self {
            Self::CacheHit(r) | Self::Completed(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<R> {
        match self {
            Self::CacheHit(r) | Self::Completed(r) => Some(r),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> TaskOutcome<U> {
        self.try_map(|r| Ok(f(r)))
    }

    /// Convert the result; a conversion error turns the outcome into a failure
    pub fn try_map<U>(self, f: impl FnOnce(R) -> Result<U, String>) -> TaskOutcome<U> {
        match self {
            Self::Skipped(reason) => TaskOutcome::Skipped(reason),
            Self::CacheHit(r) => f(r).map_or_else(TaskOutcome::Failed, TaskOutcome::CacheHit),
            Self::Completed(r) => f(r).map_or_else(TaskOutcome::Failed, TaskOutcome::Completed),
            Self::Failed(message) => TaskOutcome::Failed(message),
            Self::Cancelled => TaskOutcome::Cancelled,
            Self::Superseded => TaskOutcome::Superseded,
        }
    }
}

enum Settling<R> {
    Ready(TaskOutcome<R>),
    Pending(BoxFuture<'static, TaskOutcome<R>>),
}

/// Handle returned by `execute_task`.
///
/// Dropping the handle does not stop the execution; call [`cancel`] for
/// that.
///
/// [`cancel`]: TaskHandle::cancel
pub struct TaskHandle<R> {
    task_id: TaskId,
    request_id: Option<RequestId>,
    cancel: CancellationToken,
    settling: Settling<R>,
}

impl<R: Send + 'static> TaskHandle<R> {
    pub(crate) fn ready(
        task_id: TaskId,
        request_id: Option<RequestId>,
        outcome: TaskOutcome<R>,
    ) -> Self {
        Self {
            task_id,
            request_id,
            cancel: CancellationToken::new(),
            settling: Settling::Ready(outcome),
        }
    }

    pub(crate) fn pending(
        task_id: TaskId,
        request_id: RequestId,
        cancel: CancellationToken,
        join: JoinHandle<TaskOutcome<R>>,
    ) -> Self {
        let settling = join
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    TaskOutcome::Failed(WorkerError::from_join_error(e).to_string())
                })
            })
            .boxed();
        Self {
            task_id,
            request_id: Some(request_id),
            cancel,
            settling: Settling::Pending(settling),
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Request id of the dispatch, if one happened
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Whether the executor was invoked for this call
    pub fn is_dispatched(&self) -> bool {
        matches!(self.settling, Settling::Pending(_))
    }

    /// Cancel the execution.
    ///
    /// The request settles as cancelled right away; the executor may keep
    /// running but can no longer touch task state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the request to settle
    pub async fn wait(self) -> TaskOutcome<R> {
        match self.settling {
            Settling::Ready(outcome) => outcome,
            Settling::Pending(settling) => settling.await,
        }
    }

    /// Convert the eventual result
    pub fn map<U: Send + 'static>(self, f: impl FnOnce(R) -> U + Send + 'static) -> TaskHandle<U> {
        self.map_outcome(move |outcome| outcome.map(f))
    }

    /// Convert the eventual result, reporting conversion errors as failures
    pub fn try_map<U: Send + 'static>(
        self,
        f: impl FnOnce(R) -> Result<U, String> + Send + 'static,
    ) -> TaskHandle<U> {
        self.map_outcome(move |outcome| outcome.try_map(f))
    }

    fn map_outcome<U: Send + 'static>(
        self,
        f: impl FnOnce(TaskOutcome<R>) -> TaskOutcome<U> + Send + 'static,
    ) -> TaskHandle<U> {
        let settling = match self.settling {
            Settling::Ready(outcome) => Settling::Ready(f(outcome)),
            Settling::Pending(settling) => Settling::Pending(settling.map(f).boxed()),
        };
        TaskHandle {
            task_id: self.task_id,
            request_id: self.request_id,
            cancel: self.cancel,
            settling,
        }
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task_id", &self.task_id)
            .field("request_id", &self.request_id)
            .field("dispatched", &matches!(self.settling, Settling::Pending(_)))
            .finish()
    }
}
