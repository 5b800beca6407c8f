//! Input Resolvers
//!
//! Turns a [`SearchQueryInput`] into a [`DataFrame`] asynchronously. The
//! runner only depends on the trait; the default implementation reads the
//! queried index from the document store and projects the requested numeric
//! fields into columns.

use std::sync::Arc;

use async_trait::async_trait;

use super::{DataFrame, SearchQueryInput};
use crate::error::MlError;
use crate::store::DocumentStore;

#[async_trait]
pub trait InputResolver: Send + Sync {
    /// Resolves a query into tabular input. Failures must surface the
    /// original cause as `MlError::InputResolutionFailed`.
    async fn resolve(&self, query: &SearchQueryInput) -> Result<DataFrame, MlError>;
}

/// Resolver backed by the node's document store.
pub struct DocumentStoreResolver {
    store: Arc<dyn DocumentStore>,
}

impl DocumentStoreResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl InputResolver for DocumentStoreResolver {
    async fn resolve(&self, query: &SearchQueryInput) -> Result<DataFrame, MlError> {
        let docs = self
            .store
            .scan(&query.index, query.limit)
            .await
            .map_err(|e| {
                MlError::InputResolutionFailed(format!(
                    "failed to read index {}: {}",
                    query.index, e
                ))
            })?;

        let mut frame = DataFrame::new(query.columns.clone());
        for doc in docs {
            let mut row = Vec::with_capacity(query.columns.len());
            for column in &query.columns {
                let value = doc.get(column).and_then(|v| v.as_f64()).ok_or_else(|| {
                    MlError::InputResolutionFailed(format!(
                        "document in index {} has no numeric field {}",
                        query.index, column
                    ))
                })?;
                row.push(value);
            }
            frame.push_row(row)?;
        }

        if frame.is_empty() {
            return Err(MlError::InputResolutionFailed(format!(
                "query against index {} produced no rows",
                query.index
            )));
        }

        tracing::debug!(
            "Resolved query input: index={} rows={} columns={}",
            query.index,
            frame.len(),
            frame.column_names.len()
        );

        Ok(frame)
    }
}
