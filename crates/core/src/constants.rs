//! Constants used throughout the esoworker codebase

// Result cache
pub const MAX_RESULT_CACHE_SIZE: usize = 3;

// Error messages
pub const UNKNOWN_WORKER_ERROR: &str = "Unknown worker error";
pub const TASK_TIMEOUT_MESSAGE: &str = "Task timeout";
pub const POOL_DESTROYED_MESSAGE: &str = "WorkerPool destroyed";

// Worker pool defaults
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 30_000;

// Task time window used for the pool's running average
pub const TASK_TIME_WINDOW: usize = 100;
pub const TASK_TIME_RETAINED: usize = 50;

// Environment variable names
pub const ESOWORKER_RESULT_CACHE_SIZE_VAR: &str = "ESOWORKER_RESULT_CACHE_SIZE";
pub const ESOWORKER_MAX_WORKERS_VAR: &str = "ESOWORKER_MAX_WORKERS";
pub const ESOWORKER_TASK_TIMEOUT_MS_VAR: &str = "ESOWORKER_TASK_TIMEOUT_MS";
pub const ESOWORKER_ENABLE_LOGGING_VAR: &str = "ESOWORKER_ENABLE_LOGGING";
