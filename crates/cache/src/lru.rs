//! Bounded most-recent-first result cache
//!
//! Keeps an explicit recency order next to the entry map. The front of the
//! order is the most recently committed fingerprint; eviction pops the back.
//! There is no time-based expiry: an entry stays valid for as long as its
//! fingerprint is not evicted.

use crate::errors::{CacheError, Result};
use esoworker_core::{Fingerprint, MAX_RESULT_CACHE_SIZE};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Result cache keyed by input fingerprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultCache<R> {
    /// Cached results
    entries: HashMap<Fingerprint, R>,
    /// Recency order, most recent first
    order: VecDeque<Fingerprint>,
    /// Maximum number of entries
    #[serde(skip)]
    capacity: usize,
}

impl<R> ResultCache<R> {
    /// Create a cache holding at most `capacity` results
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity { capacity });
        }
        Ok(Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity + 1),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a result without touching recency
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&R> {
        self.entries.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Insert a result as the most recent entry.
    ///
    /// Re-inserting a fingerprint already present moves it to the front.
    /// Returns the fingerprints evicted to stay within capacity.
    pub fn insert(&mut self, fingerprint: Fingerprint, result: R) -> Vec<Fingerprint> {
        if self.entries.insert(fingerprint.clone(), result).is_some() {
            self.order.retain(|k| k != &fingerprint);
        }
        self.order.push_front(fingerprint);

        let mut evicted = Vec::new();
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_back() {
                self.entries.remove(&oldest);
                tracing::trace!(fingerprint = %oldest, "result cache eviction");
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Remove a single entry
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<R> {
        let removed = self.entries.remove(fingerprint);
        if removed.is_some() {
            self.order.retain(|k| k != fingerprint);
        }
        removed
    }

    /// Fingerprints from most to least recent
    pub fn order(&self) -> impl Iterator<Item = &Fingerprint> {
        self.order.iter()
    }

    /// Entries from most to least recent
    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &R)> {
        self.order
            .iter()
            .filter_map(|fp| self.entries.get(fp).map(|r| (fp, r)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// An empty cache with the same capacity
    pub fn cleared(&self) -> Self {
        Self {
            entries: HashMap::with_capacity(self.capacity),
            order: VecDeque::with_capacity(self.capacity + 1),
            capacity: self.capacity,
        }
    }
}

impl<R> Default for ResultCache<R> {
    fn default() -> Self {
        Self {
            entries: HashMap::with_capacity(MAX_RESULT_CACHE_SIZE),
            order: VecDeque::with_capacity(MAX_RESULT_CACHE_SIZE + 1),
            capacity: MAX_RESULT_CACHE_SIZE,
        }
    }
}
