//! Task factory
//!
//! Builds a fully wired [`TaskSlice`] from a task identifier, a fingerprint
//! function and a background executor. Nothing in here is specific to any
//! one analytic task.

use crate::coordinator::{FingerprintFn, TaskCoordinator};
use crate::executor::BackgroundExecutor;
use crate::handle::TaskHandle;
use crate::reducer::TaskAction;
use crate::state::TaskState;
use crate::store::TaskStore;
use esoworker_core::{
    Clock, Error, Fingerprint, OrchestratorConfig, Result, SystemClock, TaskId,
    MAX_RESULT_CACHE_SIZE,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Creates task slices sharing one clock and cache capacity
#[derive(Clone)]
pub struct TaskFactory {
    cache_capacity: usize,
    clock: Arc<dyn Clock>,
}

impl Default for TaskFactory {
    fn default() -> Self {
        Self {
            cache_capacity: MAX_RESULT_CACHE_SIZE,
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for TaskFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFactory")
            .field("cache_capacity", &self.cache_capacity)
            .finish_non_exhaustive()
    }
}

impl TaskFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory using the configured cache capacity
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache_capacity: config.result_cache_capacity,
            ..Self::default()
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    /// Build the managed state machine for one task
    pub fn create_task_slice<I, R>(
        &self,
        task_id: impl Into<TaskId>,
        fingerprint: impl Fn(&I) -> Fingerprint + Send + Sync + 'static,
        executor: Arc<dyn BackgroundExecutor<I, R>>,
    ) -> Result<TaskSlice<I, R>>
    where
        I: Send + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let task_id = task_id.into();
        let initial = TaskState::with_cache_capacity(self.cache_capacity).map_err(|e| {
            Error::configuration(format!("task '{task_id}': {e}"))
        })?;

        let store = TaskStore::new(initial.clone());
        let fingerprint: FingerprintFn<I> = Arc::new(fingerprint);
        let coordinator = TaskCoordinator::new(
            task_id.clone(),
            fingerprint,
            executor,
            store.clone(),
            Arc::clone(&self.clock),
        );

        tracing::debug!(task_id = %task_id, cache_capacity = self.cache_capacity, "created task slice");

        Ok(TaskSlice {
            task_id,
            initial: Arc::new(initial),
            actions: TaskActions {
                store: store.clone(),
                clock: Arc::clone(&self.clock),
            },
            coordinator: Arc::new(coordinator),
            store,
        })
    }
}

/// Build a task slice with default capacity and the system clock
pub fn create_task_slice<I, R>(
    task_id: impl Into<TaskId>,
    fingerprint: impl Fn(&I) -> Fingerprint + Send + Sync + 'static,
    executor: Arc<dyn BackgroundExecutor<I, R>>,
) -> Result<TaskSlice<I, R>>
where
    I: Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    TaskFactory::default().create_task_slice(task_id, fingerprint, executor)
}

/// Direct state mutations of one task
pub struct TaskActions<R> {
    store: TaskStore<R>,
    clock: Arc<dyn Clock>,
}

impl<R> Clone for TaskActions<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: Clone> TaskActions<R> {
    pub fn start_task(&self) {
        self.store.dispatch(TaskAction::StartTask);
    }

    /// Record progress; has no effect unless the task is loading
    pub fn update_progress(&self, progress: f64) {
        self.store.dispatch(TaskAction::UpdateProgress(progress));
    }

    /// Commit a result directly. The result cache is not touched.
    pub fn complete_task(&self, result: R) {
        let now = self.clock.now_millis();
        self.store.dispatch(TaskAction::CompleteTask { result, now });
    }

    pub fn fail_task(&self, error: impl Into<String>) {
        self.store.dispatch(TaskAction::FailTask(error.into()));
    }

    /// Forget everything, including cached results
    pub fn clear_result(&self) {
        self.store.dispatch(TaskAction::ClearResult);
    }

    /// Drop the current result and status, keeping the cache
    pub fn reset_task(&self) {
        self.store.dispatch(TaskAction::ResetTask);
    }
}

/// Managed state machine for one task
pub struct TaskSlice<I, R> {
    task_id: TaskId,
    initial: Arc<TaskState<R>>,
    actions: TaskActions<R>,
    coordinator: Arc<TaskCoordinator<I, R>>,
    store: TaskStore<R>,
}

impl<I, R> Clone for TaskSlice<I, R> {
    fn clone(&self) -> Self {
        Self {
            task_id: self.task_id.clone(),
            initial: Arc::clone(&self.initial),
            actions: self.actions.clone(),
            coordinator: Arc::clone(&self.coordinator),
            store: self.store.clone(),
        }
    }
}

impl<I, R> TaskSlice<I, R>
where
    I: Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// The state this task started in
    pub fn initial_state(&self) -> TaskState<R> {
        self.initial.as_ref().clone()
    }

    pub fn actions(&self) -> &TaskActions<R> {
        &self.actions
    }

    /// Run the task for `input` unless it is already loading or up to date
    pub fn execute_task(&self, input: I) -> TaskHandle<R> {
        self.coordinator.execute(input)
    }

    pub fn fingerprint(&self, input: &I) -> Fingerprint {
        self.coordinator.fingerprint(input)
    }

    /// Current state snapshot
    pub fn state(&self) -> TaskState<R> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState<R>> {
        self.store.subscribe()
    }

    pub fn start_task(&self) {
        self.actions.start_task();
    }

    pub fn update_progress(&self, progress: f64) {
        self.actions.update_progress(progress);
    }

    pub fn complete_task(&self, result: R) {
        self.actions.complete_task(result);
    }

    pub fn fail_task(&self, error: impl Into<String>) {
        self.actions.fail_task(error);
    }

    pub fn clear_result(&self) {
        self.actions.clear_result();
    }

    pub fn reset_task(&self) {
        self.actions.reset_task();
    }
}

impl<I, R> fmt::Debug for TaskSlice<I, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSlice")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}
