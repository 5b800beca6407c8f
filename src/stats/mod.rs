//! ML Stats Registry
//!
//! Counters tracking request, failure, model, and executing-task volume.
//! Two flavors exist:
//! - A fixed set of node-level counters, pre-registered at startup and looked
//!   up by name.
//! - An open-ended `(function, action)` space, created lazily on first use.
//!   Concurrent first-touches of the same key must observe exactly one
//!   counter and lose no increments, which is what `DashMap::entry` gives us.


use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

pub const ML_EXECUTING_TASK_COUNT: &str = "ml_executing_task_count";
pub const ML_TOTAL_REQUEST_COUNT: &str = "ml_total_request_count";
pub const ML_TOTAL_FAILURE_COUNT: &str = "ml_total_failure_count";
pub const ML_TOTAL_MODEL_COUNT: &str = "ml_total_model_count";

/// The action dimension of per-function counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    Train,
    Predict,
    Execute,
}

impl ActionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Train => "train",
            ActionName::Predict => "predict",
            ActionName::Execute => "execute",
        }
    }
}

pub fn request_count_stat(function_name: &str, action: ActionName) -> String {
    format!("ml_{}_{}_request_count", function_name, action.as_str())
}

pub fn failure_count_stat(function_name: &str, action: ActionName) -> String {
    format!("ml_{}_{}_failure_count", function_name, action.as_str())
}

pub fn model_count_stat(function_name: &str) -> String {
    format!("ml_{}_model_count", function_name)
}

/// Monotonic counter. This design never decrements.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Registry of all counters on this node.
pub struct MlStats {
    counters: DashMap<String, Arc<Counter>>,
}

impl MlStats {
    /// Creates a registry with the fixed node-level counters pre-registered.
    pub fn new() -> Arc<Self> {
        let counters = DashMap::new();
        for name in [
            ML_EXECUTING_TASK_COUNT,
            ML_TOTAL_REQUEST_COUNT,
            ML_TOTAL_FAILURE_COUNT,
            ML_TOTAL_MODEL_COUNT,
        ] {
            counters.insert(name.to_string(), Arc::new(Counter::default()));
        }
        Arc::new(Self { counters })
    }

    /// Looks up a pre-registered counter.
    ///
    /// Panics on names outside the fixed set: referencing an unregistered
    /// global stat is a programming error, not a runtime condition.
    pub fn stat(&self, name: &str) -> Arc<Counter> {
        self.counters
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| panic!("unregistered stat: {}", name))
    }

    /// Returns the counter for a dynamic key, creating it on first use.
    /// Safe under concurrent first access for the same key.
    pub fn counter_stat_if_absent(&self, key: String) -> Arc<Counter> {
        self.counters
            .entry(key)
            .or_insert_with(|| Arc::new(Counter::default()))
            .value()
            .clone()
    }

    /// Sorted snapshot of every counter, for the stats endpoint.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().value()))
            .collect()
    }
}
