//! Execution coordinator
//!
//! Decides whether an `execute_task` call should run at all, dispatches it
//! to the background executor, and settles the outcome back into the task's
//! state. Only the most recently dispatched request of a task may commit.

use crate::executor::{BackgroundExecutor, ProgressReporter, WorkerError};
use crate::handle::{SkipReason, TaskHandle, TaskOutcome};
use crate::reducer::{apply_dispatch, apply_settlement, Settlement, SettlementError, TaskAction};
use crate::state::TaskState;
use crate::store::TaskStore;
use esoworker_core::{Clock, Fingerprint, RequestId, TaskId, Timestamp};
use esoworker_utils::tracing::{cache_event, task_completed, task_progress, task_span};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

/// Pure function deriving a cache key from a task input
pub type FingerprintFn<I> = Arc<dyn Fn(&I) -> Fingerprint + Send + Sync>;

enum Decision<R> {
    Skip(SkipReason),
    CacheHit { request_id: RequestId, result: R },
    Dispatch { request_id: RequestId },
}

pub struct TaskCoordinator<I, R> {
    task_id: TaskId,
    fingerprint: FingerprintFn<I>,
    executor: Arc<dyn BackgroundExecutor<I, R>>,
    store: TaskStore<R>,
    clock: Arc<dyn Clock>,
}

impl<I, R> TaskCoordinator<I, R>
where
    I: Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new(
        task_id: TaskId,
        fingerprint: FingerprintFn<I>,
        executor: Arc<dyn BackgroundExecutor<I, R>>,
        store: TaskStore<R>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            task_id,
            fingerprint,
            executor,
            store,
            clock,
        }
    }

    pub fn fingerprint(&self, input: &I) -> Fingerprint {
        (self.fingerprint)(input)
    }

    /// Run the task for `input` unless it is redundant.
    ///
    /// The loading check, the cache lookup and the dispatch bookkeeping are
    /// applied atomically on the task's state cell. When the executor is
    /// needed it runs on a spawned tokio task, so this must be called from
    /// within a runtime.
    pub fn execute(&self, input: I) -> TaskHandle<R> {
        let fingerprint = self.fingerprint(&input);
        let now = self.clock.now_millis();

        let decision = self
            .store
            .transact(|state| decide(state, &fingerprint, now));

        match decision {
            Decision::Skip(reason) => {
                debug!(task_id = %self.task_id, fingerprint = %fingerprint, ?reason, "execution skipped");
                TaskHandle::ready(self.task_id.clone(), None, TaskOutcome::Skipped(reason))
            }
            Decision::CacheHit { request_id, result } => {
                cache_event(self.task_id.as_str(), fingerprint.as_str(), true);
                TaskHandle::ready(
                    self.task_id.clone(),
                    Some(request_id),
                    TaskOutcome::CacheHit(result),
                )
            }
            Decision::Dispatch { request_id } => {
                cache_event(self.task_id.as_str(), fingerprint.as_str(), false);
                self.spawn(request_id, fingerprint, input)
            }
        }
    }

    fn spawn(&self, request_id: RequestId, fingerprint: Fingerprint, input: I) -> TaskHandle<R> {
        let cancel = CancellationToken::new();
        let span = task_span(self.task_id.as_str(), request_id.as_str());

        let progress = {
            let store = self.store.clone();
            let task_id = self.task_id.clone();
            ProgressReporter::new(cancel.clone(), move |value| {
                task_progress(task_id.as_str(), Some(value), "progress");
                store.dispatch(TaskAction::UpdateProgress(value));
            })
        };

        let task_id = self.task_id.clone();
        let executor = Arc::clone(&self.executor);
        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let token = cancel.clone();
        let settling_id = request_id.clone();

        let join = tokio::spawn(
            async move {
                let started = Instant::now();
                debug!(fingerprint = %fingerprint, "dispatching to executor");

                let work = {
                    let task_id = task_id.clone();
                    let token = token.clone();
                    tokio::spawn(
                        async move { executor.execute(&task_id, input, progress, token).await }
                            .in_current_span(),
                    )
                };

                // The executor keeps running after cancellation; it just loses
                // the ability to settle this request.
                let settled = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(WorkerError::Cancelled),
                    joined = work => joined.unwrap_or_else(|e| Err(WorkerError::from_join_error(e))),
                };

                let outcome = settle(&store, settling_id, fingerprint, settled, clock.now_millis());
                let duration_ms = started.elapsed().as_millis() as u64;
                match &outcome {
                    TaskOutcome::Completed(_) => task_completed(task_id.as_str(), duration_ms, true),
                    TaskOutcome::Failed(message) => {
                        debug!(error = %message, "executor failed");
                        task_completed(task_id.as_str(), duration_ms, false)
                    }
                    TaskOutcome::Cancelled => debug!(duration_ms, "request cancelled"),
                    TaskOutcome::Superseded => debug!(duration_ms, "stale settlement discarded"),
                    TaskOutcome::Skipped(_) | TaskOutcome::CacheHit(_) => {}
                }
                outcome
            }
            .instrument(span),
        );

        TaskHandle::pending(self.task_id.clone(), request_id, cancel, join)
    }
}

/// Steps 2 to 4 of an execution: skip checks, cache short-circuit, dispatch
fn decide<R: Clone>(
    state: &TaskState<R>,
    fingerprint: &Fingerprint,
    now: Timestamp,
) -> (Option<TaskState<R>>, Decision<R>) {
    if state.is_loading {
        return (None, Decision::Skip(SkipReason::AlreadyLoading));
    }
    if state.result.is_some() && state.cache_metadata.last_input_hash.as_ref() == Some(fingerprint)
    {
        return (None, Decision::Skip(SkipReason::UpToDate));
    }

    let request_id = RequestId::generate();
    let dispatched = apply_dispatch(state, request_id.clone(), fingerprint.clone());

    match state.result_cache.get(fingerprint).cloned() {
        Some(result) => {
            let committed = apply_settlement(
                &dispatched,
                Settlement::Fulfilled {
                    request_id: request_id.clone(),
                    fingerprint: fingerprint.clone(),
                    result: result.clone(),
                    now,
                },
            );
            (
                Some(committed.unwrap_or(dispatched)),
                Decision::CacheHit { request_id, result },
            )
        }
        None => (Some(dispatched), Decision::Dispatch { request_id }),
    }
}

fn settle<R: Clone>(
    store: &TaskStore<R>,
    request_id: RequestId,
    fingerprint: Fingerprint,
    settled: Result<R, WorkerError>,
    now: Timestamp,
) -> TaskOutcome<R> {
    match settled {
        Ok(result) => {
            let applied = store.settle(Settlement::Fulfilled {
                request_id,
                fingerprint,
                result: result.clone(),
                now,
            });
            if applied {
                TaskOutcome::Completed(result)
            } else {
                TaskOutcome::Superseded
            }
        }
        Err(error) => {
            let error = error.classify();
            let applied = store.settle(Settlement::Rejected {
                request_id,
                error: error.clone(),
            });
            match (applied, error) {
                (false, _) => TaskOutcome::Superseded,
                (true, SettlementError::Cancelled) => TaskOutcome::Cancelled,
                (true, SettlementError::Failed(message)) => TaskOutcome::Failed(message),
            }
        }
    }
}
