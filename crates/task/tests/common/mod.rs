//! Shared helpers for orchestration tests

#![allow(dead_code)]

use async_trait::async_trait;
use esoworker_core::ManualClock;
use esoworker_task::{
    BackgroundExecutor, Fingerprint, ProgressReporter, TaskFactory, TaskId, TaskSlice, WorkerError,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub v: u32,
}

/// One pending executor invocation, resolved by the test
pub struct Call {
    pub task_id: TaskId,
    pub input: u32,
    pub progress: ProgressReporter,
    pub cancel: CancellationToken,
    reply: oneshot::Sender<Result<Output, WorkerError>>,
}

impl Call {
    pub fn succeed(self) {
        let v = self.input;
        let _ = self.reply.send(Ok(Output { v }));
    }

    pub fn respond(self, result: Result<Output, WorkerError>) {
        let _ = self.reply.send(result);
    }
}

/// Executor whose invocations stay pending until the test resolves them
pub struct GatedExecutor {
    calls: mpsc::UnboundedSender<Call>,
    count: AtomicUsize,
}

impl GatedExecutor {
    pub fn new() -> (Arc<Self>, Calls) {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = Arc::new(Self {
            calls: tx,
            count: AtomicUsize::new(0),
        });
        (executor, Calls(rx))
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackgroundExecutor<u32, Output> for GatedExecutor {
    async fn execute(
        &self,
        task_id: &TaskId,
        input: u32,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<Output, WorkerError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        let (reply, response) = oneshot::channel();
        let _ = self.calls.send(Call {
            task_id: task_id.clone(),
            input,
            progress,
            cancel,
            reply,
        });
        response.await.unwrap_or_else(|_| Err(WorkerError::unknown()))
    }
}

pub struct Calls(mpsc::UnboundedReceiver<Call>);

impl Calls {
    /// Wait for the next executor invocation
    pub async fn next(&mut self) -> Call {
        tokio::time::timeout(Duration::from_secs(5), self.0.recv())
            .await
            .expect("executor was not invoked")
            .expect("executor dropped")
    }

    /// Assert no further invocation arrives shortly
    pub async fn assert_idle(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(50), self.0.recv()).await;
        assert!(next.is_err(), "unexpected executor invocation");
    }
}

pub fn string_fingerprint(x: &u32) -> Fingerprint {
    Fingerprint::new(x.to_string())
}

/// Slice for task `T` with `hash(x) = String(x)` and a pinned clock
pub fn gated_slice() -> (TaskSlice<u32, Output>, Arc<GatedExecutor>, Calls, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let (executor, calls) = GatedExecutor::new();
    let slice = TaskFactory::new()
        .with_clock(clock.clone())
        .create_task_slice(
            "T",
            string_fingerprint,
            executor.clone() as Arc<dyn BackgroundExecutor<u32, Output>>,
        )
        .unwrap();
    (slice, executor, calls, clock)
}

pub fn cache_order(slice: &TaskSlice<u32, Output>) -> Vec<String> {
    slice
        .state()
        .cache_order()
        .into_iter()
        .map(|f| f.to_string())
        .collect()
}
