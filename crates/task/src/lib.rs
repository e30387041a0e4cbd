//! Background task orchestration for esoworker
//!
//! This crate turns a task identifier, a fingerprint function and a
//! background executor into a managed state machine that:
//! - skips work that is already running or already done for the same input
//! - serves recently computed results from a small per-task cache
//! - lets only the most recently dispatched request commit its outcome
//! - supports cooperative cancellation and progress reporting
//!
//! [`WorkerPool`] is a bounded, blocking-thread executor that can back any
//! number of tasks, and [`TaskRegistry`] looks tasks up by identifier.

pub mod analytic;
pub mod coordinator;
pub mod executor;
pub mod factory;
pub mod handle;
pub mod reducer;
pub mod registry;
pub mod state;
pub mod store;
pub mod worker_pool;

pub use analytic::AnalyticTask;
pub use coordinator::{FingerprintFn, TaskCoordinator};
pub use executor::{executor_fn, BackgroundExecutor, FnExecutor, ProgressReporter, WorkerError};
pub use factory::{create_task_slice, TaskActions, TaskFactory, TaskSlice};
pub use handle::{SkipReason, TaskHandle, TaskOutcome};
pub use reducer::{Settlement, SettlementError, TaskAction};
pub use registry::{DynTask, TaskRegistry};
pub use state::{CacheMetadata, TaskState, TaskStatus};
pub use store::TaskStore;
pub use worker_pool::{WorkerPool, WorkerStats};

pub use esoworker_cache::{display_fingerprint, json_fingerprint};
pub use esoworker_core::{Fingerprint, RequestId, TaskId};
