//! Shared utilities for esoworker
//!
//! Currently this is the structured logging setup used by the orchestrator
//! and the worker pool.

pub mod tracing;
