//! Per-task state snapshot

use esoworker_cache::{CacheError, ResultCache};
use esoworker_core::{Fingerprint, RequestId, Timestamp};
use serde::Serialize;

/// Bookkeeping used to decide whether an execution is redundant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Fingerprint of the most recently dispatched input
    pub last_input_hash: Option<Fingerprint>,
    /// When that input last produced a committed result
    pub last_executed_timestamp: Option<Timestamp>,
}

/// Observable state of one task.
///
/// Snapshots are values: every transition produces a new `TaskState` and
/// readers never observe a partially applied change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState<R> {
    pub result: Option<R>,
    pub is_loading: bool,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub last_updated: Option<Timestamp>,
    pub cache_metadata: CacheMetadata,
    /// The only request allowed to commit
    pub latest_request_id: Option<RequestId>,
    pub result_cache: ResultCache<R>,
}

impl<R> TaskState<R> {
    /// Empty state with a result cache of the given capacity
    pub fn with_cache_capacity(capacity: usize) -> Result<Self, CacheError> {
        Ok(Self::empty(ResultCache::new(capacity)?))
    }

    /// Empty state keeping this state's cache capacity
    pub(crate) fn emptied(&self) -> Self {
        Self::empty(self.result_cache.cleared())
    }

    fn empty(result_cache: ResultCache<R>) -> Self {
        Self {
            result: None,
            is_loading: false,
            progress: None,
            error: None,
            last_updated: None,
            cache_metadata: CacheMetadata::default(),
            latest_request_id: None,
            result_cache,
        }
    }

    /// Cached fingerprints, most recent first
    pub fn cache_order(&self) -> Vec<&Fingerprint> {
        self.result_cache.order().collect()
    }

    pub fn cached_result(&self, fingerprint: &Fingerprint) -> Option<&R> {
        self.result_cache.get(fingerprint)
    }

    /// Condensed, result-free view of this state
    pub fn status(&self) -> TaskStatus {
        TaskStatus {
            is_loading: self.is_loading,
            has_result: self.result.is_some(),
            progress: self.progress,
            error: self.error.clone(),
            last_updated: self.last_updated,
            last_input_hash: self.cache_metadata.last_input_hash.clone(),
            cached_fingerprints: self.result_cache.order().cloned().collect(),
        }
    }
}

impl<R> Default for TaskState<R> {
    fn default() -> Self {
        Self::empty(ResultCache::default())
    }
}

/// Type-independent summary of a task's state, used by the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub is_loading: bool,
    pub has_result: bool,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub last_updated: Option<Timestamp>,
    pub last_input_hash: Option<Fingerprint>,
    pub cached_fingerprints: Vec<Fingerprint>,
}
