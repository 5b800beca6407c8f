//! Durable Document Store
//!
//! The orchestration layer persists two kinds of documents: trained models
//! and asynchronous task records. It only depends on the [`DocumentStore`]
//! trait — index creation, put with read-after-write visibility, get, update,
//! and a scan used by the query input resolver. The in-memory implementation
//! backs single-node deployments and tests; a real deployment swaps in a
//! store talking to an external search/storage cluster.


use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::error::MlError;

/// Index holding persisted model documents.
pub const ML_MODEL_INDEX: &str = ".ml-models";
/// Index holding task records for asynchronous jobs.
pub const ML_TASK_INDEX: &str = ".ml-tasks";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Idempotent index creation. `Ok(true)` means the index exists after the
    /// call, whether or not this call created it.
    async fn create_index_if_absent(&self, index: &str) -> Result<bool, MlError>;

    /// Persists a document and returns its assigned id. The document must be
    /// readable under that id as soon as the call returns.
    async fn put(&self, index: &str, doc: Value) -> Result<String, MlError>;

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>, MlError>;

    /// Replaces an existing document. Updating a missing document is an
    /// error, not an upsert.
    async fn update(&self, index: &str, id: &str, doc: Value) -> Result<(), MlError>;

    /// Reads up to `limit` documents from an index, in unspecified order.
    async fn scan(&self, index: &str, limit: Option<usize>) -> Result<Vec<Value>, MlError>;
}

/// In-memory store: `index name -> document id -> document`.
pub struct MemoryStore {
    indices: DashMap<String, DashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            indices: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_index_if_absent(&self, index: &str) -> Result<bool, MlError> {
        self.indices
            .entry(index.to_string())
            .or_insert_with(DashMap::new);
        Ok(true)
    }

    async fn put(&self, index: &str, doc: Value) -> Result<String, MlError> {
        let id = Uuid::new_v4().to_string();
        let docs = self
            .indices
            .entry(index.to_string())
            .or_insert_with(DashMap::new);
        docs.insert(id.clone(), doc);
        tracing::debug!("Stored document {} in index {}", id, index);
        Ok(id)
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>, MlError> {
        Ok(self
            .indices
            .get(index)
            .and_then(|docs| docs.get(id).map(|entry| entry.value().clone())))
    }

    async fn update(&self, index: &str, id: &str, doc: Value) -> Result<(), MlError> {
        let docs = self.indices.get(index).ok_or_else(|| {
            MlError::PersistenceFailed(format!("index {} does not exist", index))
        })?;
        let mut entry = docs.get_mut(id).ok_or_else(|| {
            MlError::PersistenceFailed(format!("no document {} in index {}", id, index))
        })?;
        *entry = doc;
        Ok(())
    }

    async fn scan(&self, index: &str, limit: Option<usize>) -> Result<Vec<Value>, MlError> {
        let docs = match self.indices.get(index) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };
        let cap = limit.unwrap_or(usize::MAX);
        Ok(docs
            .iter()
            .take(cap)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
