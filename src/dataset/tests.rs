//! Dataset Module Tests
//!
//! Covers frame arity checks and resolution of query-shaped input from the
//! document store.

use std::sync::Arc;

use serde_json::json;

use super::resolver::{DocumentStoreResolver, InputResolver};
use super::{DataFrame, InputDataset, InputType, SearchQueryInput};
use crate::error::MlError;
use crate::store::{DocumentStore, MemoryStore};

#[test]
fn test_push_row_rejects_wrong_arity() {
    let mut frame = DataFrame::new(vec!["x".to_string(), "y".to_string()]);

    assert!(frame.push_row(vec![1.0, 2.0]).is_ok());
    let err = frame.push_row(vec![1.0]).unwrap_err();
    assert!(matches!(err, MlError::InputResolutionFailed(_)));
    assert_eq!(frame.len(), 1);
}

#[test]
fn test_input_type_reflects_dataset_shape() {
    let inline = InputDataset::DataFrame {
        frame: DataFrame::new(vec!["x".to_string()]),
    };
    let query = InputDataset::SearchQuery {
        query: SearchQueryInput {
            index: "readings".to_string(),
            columns: vec!["x".to_string()],
            limit: None,
        },
    };

    assert_eq!(inline.input_type(), InputType::DataFrame);
    assert_eq!(query.input_type(), InputType::SearchQuery);
}

#[tokio::test]
async fn test_resolver_projects_numeric_fields() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    store.create_index_if_absent("readings").await.unwrap();
    store
        .put("readings", json!({"x": 1.0, "y": 2.0, "label": "a"}))
        .await
        .unwrap();
    store
        .put("readings", json!({"x": 3.0, "y": 4.0, "label": "b"}))
        .await
        .unwrap();

    let resolver = DocumentStoreResolver::new(store);
    let frame = resolver
        .resolve(&SearchQueryInput {
            index: "readings".to_string(),
            columns: vec!["x".to_string(), "y".to_string()],
            limit: None,
        })
        .await
        .unwrap();

    assert_eq!(frame.len(), 2);
    assert_eq!(frame.column_names, vec!["x", "y"]);
    for row in &frame.rows {
        assert_eq!(row.len(), 2);
    }
}

#[tokio::test]
async fn test_resolver_fails_on_missing_column() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    store.create_index_if_absent("readings").await.unwrap();
    store.put("readings", json!({"x": 1.0})).await.unwrap();

    let resolver = DocumentStoreResolver::new(store);
    let err = resolver
        .resolve(&SearchQueryInput {
            index: "readings".to_string(),
            columns: vec!["x".to_string(), "missing".to_string()],
            limit: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, MlError::InputResolutionFailed(_)));
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn test_resolver_fails_on_empty_result() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    store.create_index_if_absent("empty").await.unwrap();

    let resolver = DocumentStoreResolver::new(store);
    let err = resolver
        .resolve(&SearchQueryInput {
            index: "empty".to_string(),
            columns: vec!["x".to_string()],
            limit: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, MlError::InputResolutionFailed(_)));
}
