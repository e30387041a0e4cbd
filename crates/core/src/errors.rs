use std::path::PathBuf;

/// Result type alias for esoworker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for esoworker operations
///
/// Ordinary task execution failures never travel through this type: they are
/// classified by the coordinator and surfaced through task state. This enum
/// covers misuse of the framework itself (unknown tasks, bad configuration,
/// payloads that do not match a task's types).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// No task registered under the identifier
    #[error("no task registered for '{task_id}'")]
    UnknownTask { task_id: String },

    /// A task was registered twice
    #[error("task '{task_id}' is already registered")]
    DuplicateTask { task_id: String },

    /// Typed lookup with the wrong input/result types
    #[error("task '{task_id}' is not registered with types {expected}")]
    TaskTypeMismatch { task_id: String, expected: String },

    /// JSON payload could not be converted to or from a task's types
    #[error("failed to {operation} payload for task '{task_id}': {source}")]
    Serialization {
        task_id: String,
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an unknown task error
    #[must_use]
    pub fn unknown_task(task_id: impl Into<String>) -> Self {
        Error::UnknownTask {
            task_id: task_id.into(),
        }
    }

    /// Create a duplicate registration error
    #[must_use]
    pub fn duplicate_task(task_id: impl Into<String>) -> Self {
        Error::DuplicateTask {
            task_id: task_id.into(),
        }
    }

    /// Create a type mismatch error
    #[must_use]
    pub fn task_type_mismatch(task_id: impl Into<String>, expected: impl Into<String>) -> Self {
        Error::TaskTypeMismatch {
            task_id: task_id.into(),
            expected: expected.into(),
        }
    }

    /// Create a payload serialization error
    #[must_use]
    pub fn serialization(
        task_id: impl Into<String>,
        operation: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        Error::Serialization {
            task_id: task_id.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}
