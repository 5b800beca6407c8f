//! Engine Module Tests
//!
//! Trains and predicts with the built-in kmeans on well-separated clusters,
//! exercises the sample calculator, and checks the unsupported-function
//! behavior.

use serde_json::json;

use super::*;
use crate::dataset::DataFrame;

/// Two well-separated clusters around (0, 0) and (10, 10).
pub fn two_cluster_frame(rows_per_cluster: usize) -> DataFrame {
    let mut frame = DataFrame::new(vec!["x".to_string(), "y".to_string()]);
    for i in 0..rows_per_cluster {
        let jitter = (i % 5) as f64 * 0.1;
        frame.push_row(vec![jitter, jitter]).unwrap();
        frame.push_row(vec![10.0 + jitter, 10.0 + jitter]).unwrap();
    }
    frame
}

fn kmeans_params() -> serde_json::Value {
    json!({"k": 2, "iterations": 10, "seed": 1})
}

#[test]
fn test_train_kmeans() {
    let engine = MlEngine::with_builtins();
    let frame = two_cluster_frame(50);

    let model = engine.train("kmeans", &kmeans_params(), &frame).unwrap();

    assert_eq!(model.name, "KMeans");
    assert_eq!(model.version, 1);
    assert!(!model.content.is_empty());
}

#[test]
fn test_predict_kmeans_assigns_known_clusters() {
    let engine = MlEngine::with_builtins();
    let model = engine
        .train("kmeans", &kmeans_params(), &two_cluster_frame(50))
        .unwrap();

    let predictions = engine
        .predict("kmeans", &json!({}), &two_cluster_frame(5), &model)
        .unwrap();

    assert_eq!(predictions.len(), 10);
    assert_eq!(predictions.column_names, vec!["cluster_id"]);
    for row in &predictions.rows {
        assert!(row[0] == 0.0 || row[0] == 1.0);
    }

    // Points near (0,0) and points near (10,10) land in different clusters.
    let near_origin = engine
        .predict(
            "kmeans",
            &json!({}),
            &DataFrame {
                column_names: vec!["x".to_string(), "y".to_string()],
                rows: vec![vec![0.1, 0.1]],
            },
            &model,
        )
        .unwrap();
    let far = engine
        .predict(
            "kmeans",
            &json!({}),
            &DataFrame {
                column_names: vec!["x".to_string(), "y".to_string()],
                rows: vec![vec![10.1, 10.1]],
            },
            &model,
        )
        .unwrap();
    assert_ne!(near_origin.rows[0][0], far.rows[0][0]);
}

#[test]
fn test_train_unsupported_algorithm() {
    let engine = MlEngine::with_builtins();
    let err = engine
        .train("unsupported_algorithm", &json!({}), &two_cluster_frame(1))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Unsupported algorithm: unsupported_algorithm"
    );
}

#[test]
fn test_kmeans_rejects_bad_k() {
    let engine = MlEngine::with_builtins();
    let frame = two_cluster_frame(1); // 2 rows

    let err = engine
        .train("kmeans", &json!({"k": 5, "seed": 1}), &frame)
        .unwrap_err();
    assert!(matches!(err, crate::error::MlError::EngineFailure(_)));
}

#[test]
fn test_sample_calculator_operations() {
    let engine = MlEngine::with_builtins();

    let sum = engine
        .execute(
            "local_sample_calculator",
            &json!({"operation": "sum", "input_data": [1.0, 2.0]}),
        )
        .unwrap();
    assert_eq!(sum["result"], 3.0);

    let max = engine
        .execute(
            "local_sample_calculator",
            &json!({"operation": "max", "input_data": [1.0, 9.0, 4.0]}),
        )
        .unwrap();
    assert_eq!(max["result"], 9.0);

    let err = engine
        .execute(
            "local_sample_calculator",
            &json!({"operation": "median", "input_data": [1.0]}),
        )
        .unwrap_err();
    assert!(err.to_string().contains("median"));
}

#[test]
fn test_execute_unsupported_function() {
    let engine = MlEngine::with_builtins();
    let err = engine.execute("no_such_function", &json!({})).unwrap_err();
    assert_eq!(err.to_string(), "Unsupported algorithm: no_such_function");
}
