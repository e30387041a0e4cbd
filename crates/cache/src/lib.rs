//! Result caching for esoworker
//!
//! This crate provides the two pieces of the orchestrator that decide
//! whether work must run at all:
//! - Input fingerprinting (deterministic cache keys)
//! - A small bounded, most-recent-first result cache per task

pub mod errors;
pub mod hashing;
pub mod lru;

pub use errors::{CacheError, Result};
pub use hashing::{display_fingerprint, json_fingerprint};
pub use lru::ResultCache;
