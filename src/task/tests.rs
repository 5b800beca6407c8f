use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::dispatcher::TaskDispatcher;
use super::manager::TaskManager;
use super::protocol::{ExecuteRequest, PredictionRequest, TrainingRequest};
use super::runner::TaskRunner;
use super::types::{MlTask, MlTaskState, MlTaskType, TaskId, User};
use crate::breaker::CircuitBreakerService;
use crate::breaker::tests::StaticCircuitBreaker;
use crate::cluster::service::ClusterService;
use crate::cluster::types::{NodeId, NodeInfo, NodeState};
use crate::dataset::resolver::{DocumentStoreResolver, InputResolver};
use crate::dataset::{DataFrame, InputDataset, InputType, SearchQueryInput};
use crate::engine::tests::two_cluster_frame;
use crate::engine::MlEngine;
use crate::error::MlError;
use crate::stats::{MlStats, ML_EXECUTING_TASK_COUNT, ML_TOTAL_FAILURE_COUNT};
use crate::store::{DocumentStore, MemoryStore, ML_MODEL_INDEX};

struct TestNode {
    runner: Arc<TaskRunner>,
    stats: Arc<MlStats>,
    manager: Arc<TaskManager>,
    cluster: Arc<ClusterService>,
    store: Arc<dyn DocumentStore>,
}

fn build_node(breakers: CircuitBreakerService) -> TestNode {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let cluster = ClusterService::new(addr, Vec::new());
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let manager = TaskManager::new(store.clone());
    let stats = MlStats::new();
    let resolver: Arc<dyn InputResolver> = Arc::new(DocumentStoreResolver::new(store.clone()));

    let runner = TaskRunner::new(
        cluster.clone(),
        manager.clone(),
        stats.clone(),
        Arc::new(breakers),
        store.clone(),
        MlEngine::with_builtins(),
        resolver,
    );

    TestNode {
        runner,
        stats,
        manager,
        cluster,
        store,
    }
}

fn open_breaker_node() -> TestNode {
    let mut breakers = CircuitBreakerService::new();
    breakers.register(Box::new(StaticCircuitBreaker::new(true)));
    build_node(breakers)
}

fn train_request(frame: DataFrame, asynchronous: bool, user: Option<User>) -> TrainingRequest {
    TrainingRequest {
        function_name: "kmeans".to_string(),
        parameters: json!({"k": 2, "iterations": 5, "seed": 42}),
        input: InputDataset::DataFrame { frame },
        asynchronous,
        user,
    }
}

fn predict_request(model_id: Option<String>, user: Option<User>) -> PredictionRequest {
    PredictionRequest {
        function_name: "kmeans".to_string(),
        parameters: json!({}),
        model_id,
        input: InputDataset::DataFrame {
            frame: two_cluster_frame(4),
        },
        user,
    }
}

async fn wait_for_terminal(manager: &Arc<TaskManager>, task_id: &TaskId) -> MlTask {
    for _ in 0..200 {
        if let Ok(Some(task)) = manager.get_task(task_id).await {
            if task.state.is_terminal() {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached a terminal state", task_id.0);
}

#[tokio::test]
async fn test_sync_training_persists_model_and_clears_registry() {
    let node = build_node(CircuitBreakerService::new());
    let response = node
        .runner
        .run_train(train_request(two_cluster_frame(50), false, None))
        .await
        .unwrap();

    assert_eq!(response.status, "COMPLETED");
    assert!(response.task_id.is_none());
    let model_id = response.model_id.expect("sync training returns a model id");

    let doc = node
        .store
        .get(ML_MODEL_INDEX, &model_id)
        .await
        .unwrap()
        .expect("model document was persisted");
    assert_eq!(doc["algorithm"], "kmeans");
    assert_eq!(doc["name"], "KMeans");
    assert_eq!(doc["version"], 1);

    // The task left the registry; the counters keep their history.
    assert_eq!(node.manager.task_count(), 0);
    let snapshot = node.stats.snapshot();
    assert_eq!(snapshot[ML_EXECUTING_TASK_COUNT], 1);
    assert_eq!(snapshot["ml_total_request_count"], 1);
    assert_eq!(snapshot["ml_total_model_count"], 1);
    assert_eq!(snapshot["ml_kmeans_train_request_count"], 1);
    assert_eq!(snapshot["ml_kmeans_model_count"], 1);
    assert_eq!(snapshot[ML_TOTAL_FAILURE_COUNT], 0);
}

#[tokio::test]
async fn test_async_training_returns_handle_then_completes() {
    let node = build_node(CircuitBreakerService::new());
    let response = node
        .runner
        .run_train(train_request(two_cluster_frame(6), true, None))
        .await
        .unwrap();

    assert_eq!(response.status, "CREATED");
    assert!(response.model_id.is_none());
    let task_id = TaskId(response.task_id.expect("async training returns a task id"));

    let task = wait_for_terminal(&node.manager, &task_id).await;
    assert_eq!(task.state, MlTaskState::Completed);
    let model_id = task.model_id.expect("completed task carries the model id");
    assert!(node
        .store
        .get(ML_MODEL_INDEX, &model_id)
        .await
        .unwrap()
        .is_some());
    assert_eq!(node.manager.task_count(), 0);
}

#[tokio::test]
async fn test_async_training_failure_lands_on_task_document() {
    let node = build_node(CircuitBreakerService::new());
    let empty = DataFrame::new(vec!["x".to_string(), "y".to_string()]);
    let response = node
        .runner
        .run_train(train_request(empty, true, None))
        .await
        .unwrap();

    let task_id = TaskId(response.task_id.unwrap());
    let task = wait_for_terminal(&node.manager, &task_id).await;

    assert_eq!(task.state, MlTaskState::Failed);
    assert!(task.error.is_some());
    assert!(task.model_id.is_none());
    assert_eq!(node.stats.snapshot()[ML_TOTAL_FAILURE_COUNT], 1);
    assert_eq!(node.stats.snapshot()["ml_kmeans_train_failure_count"], 1);
}

#[tokio::test]
async fn test_unsupported_algorithm_creates_no_task() {
    let node = build_node(CircuitBreakerService::new());
    let mut request = train_request(two_cluster_frame(4), false, None);
    request.function_name = "linear_regression".to_string();

    let err = node.runner.run_train(request).await.unwrap_err();

    assert_eq!(
        err,
        MlError::UnsupportedAlgorithm("Unsupported algorithm: linear_regression".to_string())
    );
    assert_eq!(node.manager.task_count(), 0);
    let snapshot = node.stats.snapshot();
    assert_eq!(snapshot[ML_EXECUTING_TASK_COUNT], 0);
    assert_eq!(snapshot[ML_TOTAL_FAILURE_COUNT], 1);
}

#[tokio::test]
async fn test_open_breaker_rejects_before_task_creation() {
    let node = open_breaker_node();
    let err = node
        .runner
        .run_train(train_request(two_cluster_frame(4), false, None))
        .await
        .unwrap_err();

    assert!(matches!(err, MlError::AdmissionRejected(_)));
    assert_eq!(node.manager.task_count(), 0);
    assert_eq!(node.stats.snapshot()[ML_EXECUTING_TASK_COUNT], 0);
}

#[tokio::test]
async fn test_prediction_requires_a_model_id() {
    let node = build_node(CircuitBreakerService::new());
    let err = node
        .runner
        .run_predict(predict_request(None, None))
        .await
        .unwrap_err();

    assert_eq!(err, MlError::ModelNotFound("ModelId is invalid".to_string()));
}

#[tokio::test]
async fn test_prediction_with_unknown_model_names_the_id() {
    let node = build_node(CircuitBreakerService::new());
    let err = node
        .runner
        .run_predict(predict_request(Some("missing-model".to_string()), None))
        .await
        .unwrap_err();

    assert!(matches!(err, MlError::ModelNotFound(_)));
    assert!(err.to_string().contains("missing-model"));
}

#[tokio::test]
async fn test_prediction_denied_for_foreign_user() {
    let node = build_node(CircuitBreakerService::new());
    let owner = User::new("alice", &["ml_team"]);
    let model_id = node
        .runner
        .run_train(train_request(two_cluster_frame(6), false, Some(owner)))
        .await
        .unwrap()
        .model_id
        .unwrap();

    let caller = User::new("bob", &["analytics"]);
    let err = node
        .runner
        .run_predict(predict_request(Some(model_id.clone()), Some(caller)))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        format!(
            "User: bob does not have permissions to run predict by model: {}",
            model_id
        )
    );
    assert_eq!(node.manager.task_count(), 0);
    assert_eq!(node.stats.snapshot()["ml_kmeans_predict_failure_count"], 1);
}

#[tokio::test]
async fn test_prediction_allowed_through_shared_role() {
    let node = build_node(CircuitBreakerService::new());
    let owner = User::new("alice", &["ml_team"]);
    let model_id = node
        .runner
        .run_train(train_request(two_cluster_frame(6), false, Some(owner)))
        .await
        .unwrap()
        .model_id
        .unwrap();

    let caller = User::new("carol", &["analytics", "ml_team"]);
    let response = node
        .runner
        .run_predict(predict_request(Some(model_id), Some(caller)))
        .await
        .unwrap();

    assert_eq!(response.status, "COMPLETED");
    assert_eq!(response.predictions.len(), two_cluster_frame(4).len());
    assert_eq!(response.predictions.column_names, vec!["cluster_id"]);
}

#[tokio::test]
async fn test_unowned_model_is_open_to_everyone() {
    let node = build_node(CircuitBreakerService::new());
    let model_id = node
        .runner
        .run_train(train_request(two_cluster_frame(6), false, None))
        .await
        .unwrap()
        .model_id
        .unwrap();

    let caller = User::new("bob", &[]);
    let response = node
        .runner
        .run_predict(predict_request(Some(model_id), Some(caller)))
        .await;

    assert!(response.is_ok());
}

#[tokio::test]
async fn test_execute_runs_the_sample_calculator() {
    let node = build_node(CircuitBreakerService::new());
    let response = node
        .runner
        .run_execute(ExecuteRequest {
            function_name: "local_sample_calculator".to_string(),
            input: json!({"operation": "sum", "input_data": [1.0, 2.0, 3.0, 4.0]}),
        })
        .await
        .unwrap();

    assert_eq!(response.function_name, "local_sample_calculator");
    assert_eq!(response.result, json!({"result": 10.0}));
    assert_eq!(node.manager.task_count(), 0);
}

#[tokio::test]
async fn test_training_from_search_query_input() {
    let node = build_node(CircuitBreakerService::new());
    node.store.create_index_if_absent("sensor-data").await.unwrap();
    for i in 0..8 {
        let v = f64::from(i);
        node.store
            .put("sensor-data", json!({"x": v, "y": v * 2.0, "label": "s"}))
            .await
            .unwrap();
    }

    let request = TrainingRequest {
        function_name: "kmeans".to_string(),
        parameters: json!({"k": 2, "seed": 7}),
        input: InputDataset::SearchQuery {
            query: SearchQueryInput {
                index: "sensor-data".to_string(),
                columns: vec!["x".to_string(), "y".to_string()],
                limit: None,
            },
        },
        asynchronous: false,
        user: None,
    };

    let response = node.runner.run_train(request).await.unwrap();
    assert!(response.model_id.is_some());
}

#[tokio::test]
async fn test_dispatcher_picks_node_with_most_free_memory() {
    let node = build_node(CircuitBreakerService::new());
    node.cluster.set_local_resources(100, 1_000);

    let remote = NodeId("remote-node".to_string());
    node.cluster.observe(NodeInfo {
        id: remote.clone(),
        http_addr: "127.0.0.1:9999".parse().unwrap(),
        state: NodeState::Alive,
        mem_free_bytes: 1_000_000,
        mem_total_bytes: 2_000_000,
        last_heartbeat_ms: 0,
    });

    let dispatcher = TaskDispatcher::new(node.cluster.clone());
    assert_eq!(dispatcher.dispatch().await.unwrap(), remote);
}

#[tokio::test]
async fn test_dispatcher_breaks_memory_ties_by_node_id() {
    let node = build_node(CircuitBreakerService::new());
    node.cluster.set_local_resources(100, 1_000);

    for name in ["node-b", "node-a"] {
        node.cluster.observe(NodeInfo {
            id: NodeId(name.to_string()),
            http_addr: "127.0.0.1:9999".parse().unwrap(),
            state: NodeState::Alive,
            mem_free_bytes: 1_000_000,
            mem_total_bytes: 2_000_000,
            last_heartbeat_ms: 0,
        });
    }

    let dispatcher = TaskDispatcher::new(node.cluster.clone());
    assert_eq!(dispatcher.dispatch().await.unwrap(), NodeId("node-a".to_string()));
}

#[tokio::test]
#[should_panic(expected = "duplicate task id")]
async fn test_duplicate_task_registration_panics() {
    let node = build_node(CircuitBreakerService::new());
    let task = MlTask::new(
        MlTaskType::Training,
        "kmeans".to_string(),
        InputType::DataFrame,
        node.cluster.local_node_id.clone(),
        false,
    );
    node.manager.add(task.clone());
    node.manager.add(task);
}

#[tokio::test]
async fn test_task_removal_is_idempotent() {
    let node = build_node(CircuitBreakerService::new());
    let task = MlTask::new(
        MlTaskType::Execution,
        "local_sample_calculator".to_string(),
        InputType::DataFrame,
        node.cluster.local_node_id.clone(),
        false,
    );
    let task_id = task.task_id.clone();
    node.manager.add(task);

    node.manager.remove(&task_id);
    node.manager.remove(&task_id);
    assert!(!node.manager.contains(&task_id));
}

#[tokio::test]
async fn test_terminal_state_absorbs_further_transitions() {
    let node = build_node(CircuitBreakerService::new());
    let task = MlTask::new(
        MlTaskType::Training,
        "kmeans".to_string(),
        InputType::DataFrame,
        node.cluster.local_node_id.clone(),
        false,
    );
    let task_id = task.task_id.clone();
    node.manager.add(task);

    node.manager
        .update_task_state(&task_id, MlTaskState::Completed, false)
        .await
        .unwrap();
    node.manager
        .update_task_state(&task_id, MlTaskState::Running, false)
        .await
        .unwrap();

    assert_eq!(
        node.manager.get(&task_id).unwrap().state,
        MlTaskState::Completed
    );
}
