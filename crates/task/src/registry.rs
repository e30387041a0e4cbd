//! Task registry
//!
//! Maps task identifiers to their slices so callers can run "the task named
//! X" without branching on every known task. Lookups come in two flavours:
//! typed, returning the original [`TaskSlice`], and erased, speaking
//! `serde_json::Value` in both directions.

use crate::factory::TaskSlice;
use crate::handle::TaskHandle;
use crate::state::TaskStatus;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use esoworker_core::{Error, Result, TaskId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type-erased view of a registered task
pub trait DynTask: Send + Sync {
    fn task_id(&self) -> &TaskId;

    /// Decode `input` and execute the task
    fn dispatch(&self, input: Value) -> Result<TaskHandle<Value>>;

    fn status(&self) -> TaskStatus;

    /// Full state snapshot, result and cache included
    fn state_json(&self) -> Result<Value>;

    fn reset(&self);

    fn clear(&self);
}

struct JsonTask<I, R> {
    slice: TaskSlice<I, R>,
}

impl<I, R> DynTask for JsonTask<I, R>
where
    I: DeserializeOwned + Send + 'static,
    R: Serialize + Clone + Send + Sync + 'static,
{
    fn task_id(&self) -> &TaskId {
        self.slice.task_id()
    }

    fn dispatch(&self, input: Value) -> Result<TaskHandle<Value>> {
        let task_id = self.slice.task_id().clone();
        let input: I = serde_json::from_value(input)
            .map_err(|e| Error::serialization(task_id.as_str(), "decode input", e))?;

        Ok(self.slice.execute_task(input).try_map(move |result| {
            serde_json::to_value(&result).map_err(|e| {
                tracing::warn!(task_id = %task_id, error = %e, "result could not be encoded");
                format!("failed to encode result of task '{task_id}': {e}")
            })
        }))
    }

    fn status(&self) -> TaskStatus {
        self.slice.state().status()
    }

    fn state_json(&self) -> Result<Value> {
        serde_json::to_value(self.slice.state())
            .map_err(|e| Error::serialization(self.slice.task_id().as_str(), "encode state", e))
    }

    fn reset(&self) {
        self.slice.reset_task();
    }

    fn clear(&self) {
        self.slice.clear_result();
    }
}

#[derive(Clone)]
struct RegisteredTask {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn DynTask>,
}

/// Registry of all task slices of an application
#[derive(Default)]
pub struct TaskRegistry {
    tasks: DashMap<TaskId, RegisteredTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slice under its own task identifier
    pub fn register<I, R>(&self, slice: TaskSlice<I, R>) -> Result<()>
    where
        I: DeserializeOwned + Send + 'static,
        R: Serialize + Clone + Send + Sync + 'static,
    {
        let task_id = slice.task_id().clone();
        match self.tasks.entry(task_id) {
            Entry::Occupied(entry) => Err(Error::duplicate_task(entry.key().as_str())),
            Entry::Vacant(entry) => {
                tracing::debug!(task_id = %entry.key(), "registered task");
                entry.insert(RegisteredTask {
                    typed: Arc::new(slice.clone()),
                    erased: Arc::new(JsonTask { slice }),
                });
                Ok(())
            }
        }
    }

    /// Remove a task; returns whether it was registered
    pub fn unregister(&self, task_id: &str) -> bool {
        self.tasks.remove(task_id).is_some()
    }

    /// Typed lookup
    pub fn get<I, R>(&self, task_id: &str) -> Result<TaskSlice<I, R>>
    where
        I: 'static,
        R: 'static,
    {
        let typed = self.entry(task_id)?.typed;
        typed
            .downcast_ref::<TaskSlice<I, R>>()
            .cloned()
            .ok_or_else(|| {
                Error::task_type_mismatch(
                    task_id,
                    format!("{} -> {}", type_name::<I>(), type_name::<R>()),
                )
            })
    }

    /// Erased lookup
    pub fn task(&self, task_id: &str) -> Result<Arc<dyn DynTask>> {
        Ok(self.entry(task_id)?.erased)
    }

    /// Execute the named task with a JSON input
    pub fn dispatch(&self, task_id: &str, input: Value) -> Result<TaskHandle<Value>> {
        self.task(task_id)?.dispatch(input)
    }

    pub fn status(&self, task_id: &str) -> Result<TaskStatus> {
        Ok(self.task(task_id)?.status())
    }

    /// Status of every task, ordered by identifier
    pub fn statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.erased_tasks()
            .into_iter()
            .map(|task| (task.task_id().clone(), task.status()))
            .collect()
    }

    pub fn reset_all(&self) {
        for task in self.erased_tasks() {
            task.reset();
        }
    }

    pub fn clear_all(&self) {
        for task in self.erased_tasks() {
            task.clear();
        }
    }

    /// Registered identifiers in sorted order
    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.tasks.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn entry(&self, task_id: &str) -> Result<RegisteredTask> {
        self.tasks
            .get(task_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::unknown_task(task_id))
    }

    // Clone the handles out so no shard lock is held while calling into tasks
    fn erased_tasks(&self) -> Vec<Arc<dyn DynTask>> {
        self.tasks
            .iter()
            .map(|e| Arc::clone(&e.value().erased))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{executor_fn, WorkerError};
    use crate::factory::create_task_slice;
    use crate::handle::TaskOutcome;
    use esoworker_core::Fingerprint;
    use std::collections::HashMap;

    fn doubling_slice(task_id: &str) -> TaskSlice<u32, u64> {
        create_task_slice(
            task_id,
            |n: &u32| Fingerprint::new(n.to_string()),
            executor_fn(|_, n: u32, _, _| async move { Ok::<_, WorkerError>(u64::from(n) * 2) }),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = TaskRegistry::new();
        registry.register(doubling_slice("double")).unwrap();
        let err = registry.register(doubling_slice("double")).unwrap_err();
        assert!(matches!(err, Error::DuplicateTask { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_typed_lookup() {
        let registry = TaskRegistry::new();
        registry.register(doubling_slice("double")).unwrap();

        let slice = registry.get::<u32, u64>("double").unwrap();
        assert_eq!(slice.task_id().as_str(), "double");

        let err = registry.get::<String, u64>("double").unwrap_err();
        assert!(matches!(err, Error::TaskTypeMismatch { .. }));

        let err = registry.get::<u32, u64>("missing").unwrap_err();
        assert!(matches!(err, Error::UnknownTask { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_by_identifier() {
        let registry = TaskRegistry::new();
        registry.register(doubling_slice("double")).unwrap();

        let outcome = registry
            .dispatch("double", serde_json::json!(21))
            .unwrap()
            .wait()
            .await;
        assert_eq!(outcome, TaskOutcome::Completed(serde_json::json!(42)));

        let status = registry.status("double").unwrap();
        assert!(status.has_result);
        assert_eq!(status.cached_fingerprints, vec![Fingerprint::from("21")]);

        let state = registry.task("double").unwrap().state_json().unwrap();
        assert_eq!(state["result"], 42);
    }

    #[tokio::test]
    async fn test_unencodable_result_is_a_failure() {
        // JSON object keys must be strings, so tuple-keyed maps cannot encode
        let slice: TaskSlice<u32, HashMap<(u32, u32), u32>> = create_task_slice(
            "pairs",
            |n: &u32| Fingerprint::new(n.to_string()),
            executor_fn(|_, n: u32, _, _| async move {
                Ok::<_, WorkerError>(HashMap::from([((n, n), n)]))
            }),
        )
        .unwrap();
        let registry = TaskRegistry::new();
        registry.register(slice).unwrap();

        let outcome = registry
            .dispatch("pairs", serde_json::json!(2))
            .unwrap()
            .wait()
            .await;
        match outcome {
            TaskOutcome::Failed(message) => {
                assert!(message.starts_with("failed to encode result of task 'pairs'"));
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_rejects_bad_input() {
        let registry = TaskRegistry::new();
        registry.register(doubling_slice("double")).unwrap();

        let err = registry
            .dispatch("double", serde_json::json!("not a number"))
            .unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(!registry.status("double").unwrap().is_loading);
    }

    #[test]
    fn test_bulk_operations() {
        let registry = TaskRegistry::new();
        registry.register(doubling_slice("b")).unwrap();
        registry.register(doubling_slice("a")).unwrap();

        let ids: Vec<String> = registry.task_ids().into_iter().map(|t| t.to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        registry.get::<u32, u64>("a").unwrap().complete_task(1);
        registry.reset_all();
        assert!(registry.statuses().values().all(|s| !s.has_result));

        assert!(registry.unregister("a"));
        assert!(!registry.contains("a"));
        registry.clear_all();
        assert_eq!(registry.len(), 1);
    }
}
