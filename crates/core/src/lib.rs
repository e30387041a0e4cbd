//! Core domain types, errors, and configuration for `esoworker`.
//!
//! This crate holds the building blocks shared by the cache and task
//! orchestration crates.
//!
//! ## Key Components
//!
//! - **`errors`**: the framework `Error` enum and `Result` alias.
//! - **`types`**: newtype identifiers (`TaskId`, `Fingerprint`, `RequestId`)
//!   and the `Clock` used to stamp commits.
//! - **`config`**: orchestrator and worker pool configuration with defaults,
//!   environment overrides and JSON file loading.
//! - **`constants`**: shared limits and messages.

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    config::{ConfigSource, OrchestratorConfig, WorkerPoolConfig},
    constants::*,
    errors::{Error, Result},
    types::*,
};
