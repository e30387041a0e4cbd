//! The per-task state cell
//!
//! One `watch` channel per task holds the current [`TaskState`]. Writers
//! serialize on a lock, read the current snapshot, and swap in the
//! replacement produced by a reducer, so every transition is atomic and
//! subscribers see whole snapshots only.

use crate::reducer::{apply_action, apply_settlement, Settlement, TaskAction};
use crate::state::TaskState;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

pub struct TaskStore<R> {
    sender: Arc<watch::Sender<TaskState<R>>>,
    writer: Arc<Mutex<()>>,
}

impl<R> Clone for TaskStore<R> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<R: Clone> TaskStore<R> {
    pub fn new(initial: TaskState<R>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> TaskState<R> {
        self.sender.borrow().clone()
    }

    /// Receiver notified after every applied transition
    pub fn subscribe(&self) -> watch::Receiver<TaskState<R>> {
        self.sender.subscribe()
    }

    pub fn dispatch(&self, action: TaskAction<R>) {
        self.transact(|state| (Some(apply_action(state, action)), ()));
    }

    /// Apply a settlement; returns false if it was stale and discarded
    pub fn settle(&self, settlement: Settlement<R>) -> bool {
        self.transact(|state| match apply_settlement(state, settlement) {
            Some(next) => (Some(next), true),
            None => (None, false),
        })
    }

    /// Decide and transition in a single critical section.
    ///
    /// `decide` sees the current state and may return a replacement along
    /// with a value for the caller. Subscribers are only notified when a
    /// replacement is returned.
    pub(crate) fn transact<T>(
        &self,
        decide: impl FnOnce(&TaskState<R>) -> (Option<TaskState<R>>, T),
    ) -> T {
        let _writer = self.writer.lock();
        let (next, value) = decide(&self.sender.borrow());
        if let Some(next) = next {
            self.sender.send_replace(next);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esoworker_core::{Fingerprint, RequestId};

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let store = TaskStore::new(TaskState::<u32>::default());
        let mut rx = store.subscribe();

        store.dispatch(TaskAction::StartTask);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_loading);
    }

    #[test]
    fn test_stale_settle_does_not_notify() {
        let store = TaskStore::new(TaskState::<u32>::default());
        store.settle(Settlement::Dispatched {
            request_id: RequestId::from("current"),
            fingerprint: Fingerprint::from("h"),
        });

        let rx = store.subscribe();
        let applied = store.settle(Settlement::Fulfilled {
            request_id: RequestId::from("stale"),
            fingerprint: Fingerprint::from("h"),
            result: 1,
            now: 0,
        });

        assert!(!applied);
        assert!(!rx.has_changed().unwrap());
        assert!(store.snapshot().is_loading);
    }

    #[test]
    fn test_concurrent_transactions_are_atomic() {
        let store = TaskStore::new(TaskState::<u32>::default());
        store.dispatch(TaskAction::StartTask);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        store.transact(|state| {
                            let mut next = state.clone();
                            next.progress = Some(state.progress.unwrap_or_default() + 1.0);
                            (Some(next), ())
                        });
                    }
                });
            }
        });

        assert_eq!(store.snapshot().progress, Some(800.0));
    }

    #[test]
    fn test_transact_returns_value_without_change() {
        let store = TaskStore::new(TaskState::<u32>::default());
        let rx = store.subscribe();

        let loading = store.transact(|state| (None, state.is_loading));

        assert!(!loading);
        assert!(!rx.has_changed().unwrap());
    }
}
