//! The nutrition store: a time-keyed record of term importance.
//!
//! Checkpoints are stored under their timestamp. The store is agnostic to
//! the value type: the ELD consumer stores `term -> score` maps, while the
//! volume-based consumer stores plain post counts per second.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during nutrition store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A range query's start does not precede its end.
    #[error("invalid range: since ({since}) must be before until ({until})")]
    InvalidRange { since: i64, until: i64 },
}

/// Per-term nutrition, the typical checkpoint payload.
pub type TermNutrition = HashMap<String, f64>;

/// An in-memory nutrition store, ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryNutritionStore<V> {
    store: BTreeMap<i64, V>,
}

impl<V> MemoryNutritionStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            store: BTreeMap::new(),
        }
    }

    /// Stores nutrition data at a timestamp, overwriting any previous data.
    pub fn add(&mut self, timestamp: i64, nutrition: V) {
        self.store.insert(timestamp, nutrition);
    }

    /// Returns the nutrition data at a timestamp.
    pub fn get(&self, timestamp: i64) -> Option<&V> {
        self.store.get(&timestamp)
    }

    /// Returns all nutrition data.
    pub fn all(&self) -> &BTreeMap<i64, V> {
        &self.store
    }

    /// Returns the timestamps with nutrition in `since <= k < until`.
    ///
    /// The start must precede the end.
    pub fn between(&self, since: i64, until: i64) -> StoreResult<BTreeMap<i64, &V>> {
        if since >= until {
            return Err(StoreError::InvalidRange { since, until });
        }

        Ok(self
            .store
            .range(since..until)
            .map(|(timestamp, nutrition)| (*timestamp, nutrition))
            .collect())
    }

    /// Returns the nutrition at timestamps `k >= since`.
    pub fn since(&self, since: i64) -> BTreeMap<i64, &V> {
        self.store
            .range(since..)
            .map(|(timestamp, nutrition)| (*timestamp, nutrition))
            .collect()
    }

    /// Returns the nutrition at timestamps `k < until`.
    pub fn until(&self, until: i64) -> BTreeMap<i64, &V> {
        self.store
            .range(..until)
            .map(|(timestamp, nutrition)| (*timestamp, nutrition))
            .collect()
    }

    /// Removes the nutrition at the given timestamps.
    ///
    /// Absent timestamps are ignored; an empty list is a no-op.
    pub fn remove(&mut self, timestamps: &[i64]) {
        for timestamp in timestamps {
            self.store.remove(timestamp);
        }
    }

    /// Returns the latest timestamp with nutrition, if any.
    pub fn latest(&self) -> Option<i64> {
        self.store.keys().next_back().copied()
    }

    /// Checks whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns the number of stored timestamps.
    pub fn len(&self) -> usize {
        self.store.len()
    }
}

impl<V: Clone> MemoryNutritionStore<V> {
    /// Returns a deep copy of the store.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}
