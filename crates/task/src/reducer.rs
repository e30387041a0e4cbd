//! Pure state transitions
//!
//! Every change to a [`TaskState`] goes through one of the functions in
//! this module. They never mutate their input; the state cell swaps in the
//! returned snapshot. Timestamps travel inside the actions so the functions
//! stay deterministic.

use crate::state::TaskState;
use esoworker_core::{Fingerprint, RequestId, Timestamp};

/// Direct mutations exposed to callers
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction<R> {
    /// Mark the task loading and clear progress and the previous error
    StartTask,
    /// Record progress; ignored unless loading
    UpdateProgress(f64),
    /// Commit a result without touching the result cache
    CompleteTask { result: R, now: Timestamp },
    /// Record a failure message
    FailTask(String),
    /// Return to the empty initial state, cache included
    ClearResult,
    /// Drop result and status but keep bookkeeping and cache
    ResetTask,
}

/// Why a request ended without a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    Cancelled,
    Failed(String),
}

/// Lifecycle events of a coordinated request
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement<R> {
    Dispatched {
        request_id: RequestId,
        fingerprint: Fingerprint,
    },
    Fulfilled {
        request_id: RequestId,
        fingerprint: Fingerprint,
        result: R,
        now: Timestamp,
    },
    Rejected {
        request_id: RequestId,
        error: SettlementError,
    },
}

impl<R> Settlement<R> {
    pub fn request_id(&self) -> &RequestId {
        match self {
            Settlement::Dispatched { request_id, .. }
            | Settlement::Fulfilled { request_id, .. }
            | Settlement::Rejected { request_id, .. } => request_id,
        }
    }
}

/// Apply a caller action
pub fn apply_action<R: Clone>(state: &TaskState<R>, action: TaskAction<R>) -> TaskState<R> {
    match action {
        TaskAction::StartTask => {
            let mut next = state.clone();
            next.is_loading = true;
            next.progress = None;
            next.error = None;
            next
        }
        TaskAction::UpdateProgress(progress) => {
            let mut next = state.clone();
            if next.is_loading {
                next.progress = Some(progress);
            }
            next
        }
        TaskAction::CompleteTask { result, now } => {
            let mut next = state.clone();
            next.result = Some(result);
            next.is_loading = false;
            next.progress = None;
            next.error = None;
            next.last_updated = Some(now);
            next
        }
        TaskAction::FailTask(message) => {
            let mut next = state.clone();
            next.is_loading = false;
            next.progress = None;
            next.error = Some(message);
            next
        }
        TaskAction::ClearResult => state.emptied(),
        TaskAction::ResetTask => {
            let mut next = state.clone();
            next.result = None;
            next.is_loading = false;
            next.progress = None;
            next.error = None;
            next
        }
    }
}

/// Mark a new request as the authoritative, in-flight one
pub fn apply_dispatch<R: Clone>(
    state: &TaskState<R>,
    request_id: RequestId,
    fingerprint: Fingerprint,
) -> TaskState<R> {
    let mut next = state.clone();
    next.is_loading = true;
    next.progress = None;
    next.error = None;
    next.latest_request_id = Some(request_id);
    next.cache_metadata.last_input_hash = Some(fingerprint);
    next
}

/// Apply a coordinator settlement.
///
/// Returns `None` when the settlement belongs to a request that is no longer
/// authoritative; such settlements leave the state untouched.
pub fn apply_settlement<R: Clone>(
    state: &TaskState<R>,
    settlement: Settlement<R>,
) -> Option<TaskState<R>> {
    if let Settlement::Dispatched {
        request_id,
        fingerprint,
    } = settlement
    {
        return Some(apply_dispatch(state, request_id, fingerprint));
    }

    if state.latest_request_id.as_ref() != Some(settlement.request_id()) {
        return None;
    }

    let mut next = state.clone();
    match settlement {
        Settlement::Fulfilled {
            fingerprint,
            result,
            now,
            ..
        } => {
            next.result = Some(result.clone());
            next.is_loading = false;
            next.progress = None;
            next.error = None;
            next.last_updated = Some(now);
            next.cache_metadata.last_executed_timestamp = Some(now);
            next.result_cache.insert(fingerprint, result);
        }
        Settlement::Rejected { error, .. } => {
            next.is_loading = false;
            next.progress = None;
            if let SettlementError::Failed(message) = error {
                next.error = Some(message);
            }
        }
        Settlement::Dispatched { .. } => {}
    }
    Some(next)
}
