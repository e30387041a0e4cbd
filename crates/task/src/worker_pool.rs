//! Reference background executor
//!
//! A bounded pool of blocking workers. Handlers are registered per task
//! identifier and exchange `serde_json::Value`s with the pool, so inputs and
//! outputs are always plain data by the time they cross a worker boundary.

use crate::executor::{BackgroundExecutor, ProgressReporter, WorkerError};
use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use esoworker_core::{
    OrchestratorConfig, TaskId, WorkerPoolConfig, POOL_DESTROYED_MESSAGE, TASK_TIMEOUT_MESSAGE,
    TASK_TIME_RETAINED, TASK_TIME_WINDOW,
};
use esoworker_utils::tracing::worker_span;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

type Handler = Arc<dyn Fn(Value, &ProgressReporter) -> anyhow::Result<Value> + Send + Sync>;

/// Snapshot of pool activity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub active_workers: usize,
    pub queue_size: usize,
    /// Mean duration of recent successful tasks, queueing included
    pub average_task_time_ms: f64,
}

#[derive(Debug, Default)]
struct PoolStats {
    total_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
    active_workers: AtomicUsize,
    queued: AtomicUsize,
    task_times: Mutex<VecDeque<u64>>,
}

impl PoolStats {
    fn record_task_time(&self, millis: u64) {
        let mut times = self.task_times.lock();
        times.push_back(millis);
        if times.len() > TASK_TIME_WINDOW {
            let excess = times.len() - TASK_TIME_RETAINED;
            times.drain(..excess);
        }
    }

    fn average_task_time(&self) -> f64 {
        let times = self.task_times.lock();
        if times.is_empty() {
            return 0.0;
        }
        times.iter().sum::<u64>() as f64 / times.len() as f64
    }
}

/// Marks a worker busy for as long as it is alive
struct ActiveWorker(Arc<PoolStats>);

impl ActiveWorker {
    fn start(stats: &Arc<PoolStats>) -> Self {
        stats.active_workers.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(stats))
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.0.active_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded pool of blocking task handlers
pub struct WorkerPool {
    config: WorkerPoolConfig,
    handlers: DashMap<TaskId, Handler>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
    stats: Arc<PoolStats>,
    next_job: AtomicU64,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(WorkerPoolConfig::default())
    }
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let permits = config.max_workers.max(1);
        Self {
            config,
            handlers: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(permits)),
            shutdown: CancellationToken::new(),
            stats: Arc::new(PoolStats::default()),
            next_job: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.worker_pool.clone())
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Register a handler working on raw JSON values.
    ///
    /// Registering the same identifier again replaces the handler.
    pub fn register_handler<F>(&self, task_id: impl Into<TaskId>, handler: F)
    where
        F: Fn(Value, &ProgressReporter) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(task_id.into(), Arc::new(handler));
    }

    /// Register a handler with typed input and output
    pub fn register<I, R, F>(&self, task_id: impl Into<TaskId>, handler: F)
    where
        I: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(I, &ProgressReporter) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let task_id = task_id.into();
        let name = task_id.clone();
        self.register_handler(task_id, move |value, progress| {
            let input: I = serde_json::from_value(value)
                .with_context(|| format!("invalid input for {name}"))?;
            let output = handler(input, progress)?;
            serde_json::to_value(output).with_context(|| format!("invalid output from {name}"))
        });
    }

    pub fn has_handler(&self, task_id: &str) -> bool {
        self.handlers.contains_key(task_id)
    }

    /// This pool as the executor of one task type
    pub fn executor<I, R>(self: &Arc<Self>) -> Arc<dyn BackgroundExecutor<I, R>>
    where
        I: Serialize + Send + 'static,
        R: DeserializeOwned + Send + 'static,
    {
        Arc::clone(self) as Arc<dyn BackgroundExecutor<I, R>>
    }

    /// Run a registered handler.
    ///
    /// Waits for a free worker, then runs the handler on the blocking thread
    /// pool. Cancellation and timeouts stop the wait; a handler that is
    /// already running is left to finish on its own.
    pub async fn run(
        &self,
        task_id: &TaskId,
        input: Value,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<Value, WorkerError> {
        let job_id = format!("job-{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        self.run_job(task_id, input, progress, cancel)
            .instrument(worker_span(task_id.as_str(), &job_id))
            .await
    }

    async fn run_job(
        &self,
        task_id: &TaskId,
        input: Value,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<Value, WorkerError> {
        self.stats.total_tasks.fetch_add(1, Ordering::SeqCst);
        let queued_at = Instant::now();

        if self.shutdown.is_cancelled() {
            return Err(self.failed(WorkerError::failed(POOL_DESTROYED_MESSAGE)));
        }

        let handler = match self.handlers.get(task_id) {
            Some(handler) => Arc::clone(handler.value()),
            None => {
                let error = WorkerError::failed(format!("Unknown task type: {task_id}"));
                return Err(self.failed(error));
            }
        };

        self.stats.queued.fetch_add(1, Ordering::SeqCst);
        if self.config.enable_logging {
            debug!("task queued");
        }

        let permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(WorkerError::failed(POOL_DESTROYED_MESSAGE)),
            _ = cancel.cancelled() => Err(WorkerError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| WorkerError::failed(POOL_DESTROYED_MESSAGE))
            }
        };
        self.stats.queued.fetch_sub(1, Ordering::SeqCst);
        let permit = permit.map_err(|error| self.failed(error))?;

        if self.config.enable_logging {
            debug!("task started");
        }

        let active = ActiveWorker::start(&self.stats);
        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _active = active;
            handler(input, &progress)
        });

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(WorkerError::failed(POOL_DESTROYED_MESSAGE)),
            _ = cancel.cancelled() => Err(WorkerError::Cancelled),
            joined = await_job(job, self.config.task_timeout()) => joined,
        };

        let elapsed_ms = queued_at.elapsed().as_millis() as u64;
        match outcome {
            Ok(value) => {
                self.stats.completed_tasks.fetch_add(1, Ordering::SeqCst);
                self.stats.record_task_time(elapsed_ms);
                if self.config.enable_logging {
                    info!(duration_ms = elapsed_ms, "task {task_id} completed in {elapsed_ms}ms");
                }
                Ok(value)
            }
            Err(error) => Err(self.failed(error)),
        }
    }

    /// Count and log a failure; cancellations are neither completed nor failed
    fn failed(&self, error: WorkerError) -> WorkerError {
        if error == WorkerError::Cancelled {
            debug!("task cancelled");
            return error;
        }
        self.stats.failed_tasks.fetch_add(1, Ordering::SeqCst);
        if self.config.enable_logging {
            warn!(error = %error, "task failed");
        }
        error
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            total_tasks: self.stats.total_tasks.load(Ordering::SeqCst),
            completed_tasks: self.stats.completed_tasks.load(Ordering::SeqCst),
            failed_tasks: self.stats.failed_tasks.load(Ordering::SeqCst),
            active_workers: self.stats.active_workers.load(Ordering::SeqCst),
            queue_size: self.stats.queued.load(Ordering::SeqCst),
            average_task_time_ms: self.stats.average_task_time(),
        }
    }

    /// Reject all queued, running and future work
    pub fn destroy(&self) {
        self.shutdown.cancel();
        self.semaphore.close();
        info!("worker pool destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

async fn await_job(
    job: JoinHandle<anyhow::Result<Value>>,
    timeout: Option<Duration>,
) -> Result<Value, WorkerError> {
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, job).await {
            Ok(joined) => joined,
            Err(_) => return Err(WorkerError::failed(TASK_TIMEOUT_MESSAGE)),
        },
        None => job.await,
    };
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.into()),
        Err(error) => Err(WorkerError::from_join_error(error)),
    }
}

#[async_trait]
impl<I, R> BackgroundExecutor<I, R> for WorkerPool
where
    I: Serialize + Send + 'static,
    R: DeserializeOwned + Send + 'static,
{
    async fn execute(
        &self,
        task_id: &TaskId,
        input: I,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<R, WorkerError> {
        let payload = serde_json::to_value(&input)
            .map_err(|e| WorkerError::failed(format!("failed to encode input for {task_id}: {e}")))?;
        let output = self.run(task_id, payload, progress, cancel).await?;
        serde_json::from_value(output)
            .map_err(|e| WorkerError::failed(format!("failed to decode result of {task_id}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_time_window_is_trimmed() {
        let stats = PoolStats::default();
        for _ in 0..TASK_TIME_WINDOW {
            stats.record_task_time(10);
        }
        assert_eq!(stats.task_times.lock().len(), TASK_TIME_WINDOW);

        stats.record_task_time(10);
        assert_eq!(stats.task_times.lock().len(), TASK_TIME_RETAINED);
    }

    #[test]
    fn test_average_task_time() {
        let stats = PoolStats::default();
        assert_eq!(stats.average_task_time(), 0.0);
        stats.record_task_time(10);
        stats.record_task_time(30);
        assert_eq!(stats.average_task_time(), 20.0);
    }

    #[test]
    fn test_active_worker_guard() {
        let stats = Arc::new(PoolStats::default());
        let guard = ActiveWorker::start(&stats);
        assert_eq!(stats.active_workers.load(Ordering::SeqCst), 1);
        drop(guard);
        assert_eq!(stats.active_workers.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_defaults() {
        let pool = WorkerPool::default();
        assert_eq!(pool.config().max_workers, 4);
        assert_eq!(pool.config().task_timeout(), Some(Duration::from_secs(30)));
        assert!(!pool.is_destroyed());
        assert_eq!(pool.stats().total_tasks, 0);
    }
}
