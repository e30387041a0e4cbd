//! Orchestrator configuration with precedence and validation
//!
//! Values are resolved in order: built-in defaults, an optional JSON file,
//! then `ESOWORKER_*` environment variables.

use crate::constants::{
    DEFAULT_MAX_WORKERS, DEFAULT_TASK_TIMEOUT_MS, ESOWORKER_ENABLE_LOGGING_VAR,
    ESOWORKER_MAX_WORKERS_VAR, ESOWORKER_RESULT_CACHE_SIZE_VAR, ESOWORKER_TASK_TIMEOUT_MS_VAR,
    MAX_RESULT_CACHE_SIZE,
};
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConfigSource {
    /// Default configuration
    #[default]
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
}

/// Configuration for the reference worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Maximum number of tasks running at once
    pub max_workers: usize,
    /// Per-task timeout in milliseconds; `None` disables the timeout
    pub task_timeout_ms: Option<u64>,
    /// Emit per-task debug logging
    pub enable_logging: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            task_timeout_ms: Some(DEFAULT_TASK_TIMEOUT_MS),
            enable_logging: cfg!(debug_assertions),
        }
    }
}

impl WorkerPoolConfig {
    /// Per-task timeout as a `Duration`
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    /// Set the worker limit
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set or disable the task timeout
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Toggle per-task logging
    pub fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }
}

/// Complete orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Number of results retained per task in the LRU cache
    pub result_cache_capacity: usize,
    /// Worker pool settings
    pub worker_pool: WorkerPoolConfig,
    /// Where the last applied layer came from
    #[serde(skip)]
    pub source: ConfigSource,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            result_cache_capacity: MAX_RESULT_CACHE_SIZE,
            worker_pool: WorkerPoolConfig::default(),
            source: ConfigSource::Default,
        }
    }
}

impl OrchestratorConfig {
    /// Resolve configuration from defaults, an optional file, and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env()?;
        config.validate()?;
        tracing::debug!(
            source = ?config.source,
            result_cache_capacity = config.result_cache_capacity,
            max_workers = config.worker_pool.max_workers,
            "resolved orchestrator configuration"
        );
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read config", e))?;
        let mut config: Self = serde_json::from_str(&contents).map_err(|e| {
            Error::configuration(format!("invalid config file '{}': {e}", path.display()))
        })?;
        config.source = ConfigSource::ConfigFile(path.to_path_buf());
        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// Apply `ESOWORKER_*` overrides on top of this configuration
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(capacity) = read_env::<usize>(ESOWORKER_RESULT_CACHE_SIZE_VAR)? {
            self.result_cache_capacity = capacity;
            self.source = ConfigSource::EnvironmentVariable(ESOWORKER_RESULT_CACHE_SIZE_VAR.into());
        }
        if let Some(max_workers) = read_env::<usize>(ESOWORKER_MAX_WORKERS_VAR)? {
            self.worker_pool.max_workers = max_workers;
            self.source = ConfigSource::EnvironmentVariable(ESOWORKER_MAX_WORKERS_VAR.into());
        }
        if let Some(timeout_ms) = read_env::<u64>(ESOWORKER_TASK_TIMEOUT_MS_VAR)? {
            // 0 disables the timeout
            self.worker_pool.task_timeout_ms = (timeout_ms > 0).then_some(timeout_ms);
            self.source = ConfigSource::EnvironmentVariable(ESOWORKER_TASK_TIMEOUT_MS_VAR.into());
        }
        if let Some(enable_logging) = read_env::<bool>(ESOWORKER_ENABLE_LOGGING_VAR)? {
            self.worker_pool.enable_logging = enable_logging;
            self.source = ConfigSource::EnvironmentVariable(ESOWORKER_ENABLE_LOGGING_VAR.into());
        }
        Ok(self)
    }

    /// Check limits that would make the orchestrator unusable
    pub fn validate(&self) -> Result<()> {
        if self.result_cache_capacity == 0 {
            return Err(Error::configuration(
                "result_cache_capacity must be at least 1",
            ));
        }
        if self.worker_pool.max_workers == 0 {
            return Err(Error::configuration("worker_pool.max_workers must be at least 1"));
        }
        Ok(())
    }

    /// Set the per-task result cache capacity
    pub fn with_result_cache_capacity(mut self, capacity: usize) -> Self {
        self.result_cache_capacity = capacity;
        self
    }

    /// Replace the worker pool settings
    pub fn with_worker_pool(mut self, worker_pool: WorkerPoolConfig) -> Self {
        self.worker_pool = worker_pool;
        self
    }
}

fn read_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::configuration(format!("invalid value '{raw}' for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn clear_env() {
        for var in [
            ESOWORKER_RESULT_CACHE_SIZE_VAR,
            ESOWORKER_MAX_WORKERS_VAR,
            ESOWORKER_TASK_TIMEOUT_MS_VAR,
            ESOWORKER_ENABLE_LOGGING_VAR,
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.result_cache_capacity, 3);
        assert_eq!(config.worker_pool.max_workers, 4);
        assert_eq!(
            config.worker_pool.task_timeout(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.source, ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = OrchestratorConfig::default().with_result_cache_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ESOWORKER_MAX_WORKERS_VAR, "8");
        std::env::set_var(ESOWORKER_TASK_TIMEOUT_MS_VAR, "0");

        let config = OrchestratorConfig::from_env().unwrap();
        assert_eq!(config.worker_pool.max_workers, 8);
        assert_eq!(config.worker_pool.task_timeout(), None);
        assert_eq!(config.result_cache_capacity, 3);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_rejects_garbage() {
        clear_env();
        std::env::set_var(ESOWORKER_RESULT_CACHE_SIZE_VAR, "lots");
        let result = OrchestratorConfig::from_env();
        assert!(matches!(result, Err(Error::Configuration { .. })));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_file_then_env_precedence() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"result_cache_capacity": 5, "worker_pool": {{"max_workers": 2}}}}"#
        )
        .unwrap();

        std::env::set_var(ESOWORKER_MAX_WORKERS_VAR, "6");
        let config = OrchestratorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.result_cache_capacity, 5);
        assert_eq!(config.worker_pool.max_workers, 6);
        assert_eq!(
            config.source,
            ConfigSource::EnvironmentVariable(ESOWORKER_MAX_WORKERS_VAR.to_string())
        );
        clear_env();
    }

    #[test]
    fn test_missing_file_is_file_system_error() {
        let result = OrchestratorConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(Error::FileSystem { .. })));
    }
}
