//! Task Runner
//!
//! Orchestrates one ML job from submission to its single terminal response.
//! The shared pipeline is fixed: dispatch -> (forward | local) -> admission
//! gate -> task creation + counters -> input resolution -> engine -> kind
//! specific output, with one unified failure path that updates counters and
//! the task record exactly once and preserves the originating error
//! category.
//!
//! Engine invocations are the only deliberately blocking step; they run
//! under `spawn_blocking` so request handling threads are never stalled.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::dispatcher::TaskDispatcher;
use super::manager::TaskManager;
use super::protocol::*;
use super::types::{MlModel, MlTask, MlTaskState, MlTaskType, TaskId, User};
use crate::breaker::CircuitBreakerService;
use crate::cluster::service::ClusterService;
use crate::cluster::types::NodeId;
use crate::dataset::resolver::InputResolver;
use crate::dataset::{DataFrame, InputDataset};
use crate::engine::{Model, MlEngine};
use crate::error::{ErrorBody, MlError};
use crate::stats::{
    failure_count_stat, model_count_stat, request_count_stat, ActionName, MlStats,
    ML_EXECUTING_TASK_COUNT, ML_TOTAL_FAILURE_COUNT, ML_TOTAL_MODEL_COUNT, ML_TOTAL_REQUEST_COUNT,
};
use crate::store::{DocumentStore, ML_MODEL_INDEX};

pub struct TaskRunner {
    cluster: Arc<ClusterService>,
    dispatcher: TaskDispatcher,
    manager: Arc<TaskManager>,
    stats: Arc<MlStats>,
    breakers: Arc<CircuitBreakerService>,
    store: Arc<dyn DocumentStore>,
    engine: Arc<MlEngine>,
    resolver: Arc<dyn InputResolver>,
    http_client: reqwest::Client,
}

impl TaskRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cluster: Arc<ClusterService>,
        manager: Arc<TaskManager>,
        stats: Arc<MlStats>,
        breakers: Arc<CircuitBreakerService>,
        store: Arc<dyn DocumentStore>,
        engine: Arc<MlEngine>,
        resolver: Arc<dyn InputResolver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatcher: TaskDispatcher::new(cluster.clone()),
            cluster,
            manager,
            stats,
            breakers,
            store,
            engine,
            resolver,
            http_client: reqwest::Client::new(),
        })
    }

    pub fn manager(&self) -> &Arc<TaskManager> {
        &self.manager
    }

    // ------------------------------------------------------------------
    // Dispatch entry points: resolve the worker node, then run locally or
    // forward the original request to it and relay whatever comes back.
    // ------------------------------------------------------------------

    pub async fn dispatch_train(
        self: &Arc<Self>,
        request: TrainingRequest,
    ) -> Result<TrainingResponse, MlError> {
        match self.resolve_worker(&request.function_name, ActionName::Train).await? {
            None => self.run_train(request).await,
            Some(node) => {
                let function_name = request.function_name.clone();
                self.relay(&node, ENDPOINT_INTERNAL_TRAIN, &request, &function_name, ActionName::Train)
                    .await
            }
        }
    }

    pub async fn dispatch_predict(
        self: &Arc<Self>,
        request: PredictionRequest,
    ) -> Result<PredictionResponse, MlError> {
        match self
            .resolve_worker(&request.function_name, ActionName::Predict)
            .await?
        {
            None => self.run_predict(request).await,
            Some(node) => {
                let function_name = request.function_name.clone();
                self.relay(&node, ENDPOINT_INTERNAL_PREDICT, &request, &function_name, ActionName::Predict)
                    .await
            }
        }
    }

    pub async fn dispatch_execute(
        self: &Arc<Self>,
        request: ExecuteRequest,
    ) -> Result<ExecuteResponse, MlError> {
        match self
            .resolve_worker(&request.function_name, ActionName::Execute)
            .await?
        {
            None => self.run_execute(request).await,
            Some(node) => {
                let function_name = request.function_name.clone();
                self.relay(&node, ENDPOINT_INTERNAL_EXECUTE, &request, &function_name, ActionName::Execute)
                    .await
            }
        }
    }

    /// Resolves the worker node for a job. `None` means "run it here".
    async fn resolve_worker(
        &self,
        function_name: &str,
        action: ActionName,
    ) -> Result<Option<NodeId>, MlError> {
        match self.dispatcher.dispatch().await {
            Ok(node) if node == self.cluster.local_node_id => Ok(None),
            Ok(node) => Ok(Some(node)),
            Err(e) => Err(self.fail_fast(function_name, action, e)),
        }
    }

    /// Forwards the original request to the resolved node and relays its
    /// response, preserving remote error categories. Only transport-level
    /// failures count against this node's failure stats; categorized remote
    /// failures were already counted where they happened.
    async fn relay<Req, Resp>(
        &self,
        node_id: &NodeId,
        endpoint: &str,
        request: &Req,
        function_name: &str,
        action: ActionName,
    ) -> Result<Resp, MlError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        tracing::debug!("Forwarding ML job to node {:?} via {}", node_id, endpoint);
        match self.forward(node_id, endpoint, request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if matches!(e, MlError::DispatchFailed(_)) {
                    self.count_failure_by_key(function_name, action);
                }
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Local execution paths, one per job kind. These are also what the
    // /internal/ endpoints land on for forwarded requests.
    // ------------------------------------------------------------------

    pub async fn run_train(
        self: &Arc<Self>,
        request: TrainingRequest,
    ) -> Result<TrainingResponse, MlError> {
        let action = ActionName::Train;
        if !self.engine.supports_algorithm(&request.function_name) {
            let err = MlError::unsupported_algorithm(&request.function_name);
            return Err(self.fail_fast(&request.function_name, action, err));
        }
        self.admit(&request.function_name, action)?;

        let mut task = MlTask::new(
            MlTaskType::Training,
            request.function_name.clone(),
            request.input.input_type(),
            self.cluster.local_node_id.clone(),
            request.asynchronous,
        );

        if request.asynchronous {
            if let Err(e) = self.manager.create_task(&mut task).await {
                return Err(self.fail_fast(&request.function_name, action, e));
            }
            let task_id = task.task_id.clone();

            // The caller gets the task handle now; training completion is
            // observed through the task document, never through this
            // response channel.
            let runner = Arc::clone(self);
            let background_task = task.clone();
            tokio::spawn(async move {
                match runner.start_training(background_task, request).await {
                    Ok(model_id) => tracing::info!(
                        "ML model trained successfully, task id: {}, model id: {}",
                        task_id.0,
                        model_id
                    ),
                    Err(e) => tracing::error!(
                        "Failed to train ML model for task {}: {}",
                        task_id.0,
                        e
                    ),
                }
            });

            return Ok(TrainingResponse {
                task_id: Some(task.task_id.0.clone()),
                status: MlTaskState::Created.as_str().to_string(),
                model_id: None,
            });
        }

        let model_id = self.start_training(task, request).await?;
        Ok(TrainingResponse {
            task_id: None,
            status: MlTaskState::Completed.as_str().to_string(),
            model_id: Some(model_id),
        })
    }

    pub async fn run_predict(
        self: &Arc<Self>,
        request: PredictionRequest,
    ) -> Result<PredictionResponse, MlError> {
        let action = ActionName::Predict;
        if !self.engine.supports_algorithm(&request.function_name) {
            let err = MlError::unsupported_algorithm(&request.function_name);
            return Err(self.fail_fast(&request.function_name, action, err));
        }
        self.admit(&request.function_name, action)?;

        let task = MlTask::new(
            MlTaskType::Prediction,
            request.function_name.clone(),
            request.input.input_type(),
            self.cluster.local_node_id.clone(),
            false,
        );
        let task_id = task.task_id.clone();
        let function_name = task.function_name.clone();

        self.begin_task(&task, action);
        let result = self.prediction_pipeline(&task, request).await;
        let predictions = self
            .finish_task(&task_id, &function_name, action, false, result)
            .await?;

        Ok(PredictionResponse {
            status: MlTaskState::Completed.as_str().to_string(),
            predictions,
        })
    }

    pub async fn run_execute(
        self: &Arc<Self>,
        request: ExecuteRequest,
    ) -> Result<ExecuteResponse, MlError> {
        let action = ActionName::Execute;
        if !self.engine.supports_executable(&request.function_name) {
            let err = MlError::unsupported_algorithm(&request.function_name);
            return Err(self.fail_fast(&request.function_name, action, err));
        }
        self.admit(&request.function_name, action)?;

        let task = MlTask::new(
            MlTaskType::Execution,
            request.function_name.clone(),
            crate::dataset::InputType::DataFrame,
            self.cluster.local_node_id.clone(),
            false,
        );
        let task_id = task.task_id.clone();
        let function_name = task.function_name.clone();

        self.begin_task(&task, action);
        let result = self.execution_pipeline(&task, &request).await;
        let output = self
            .finish_task(&task_id, &function_name, action, false, result)
            .await?;

        Ok(ExecuteResponse {
            function_name: request.function_name,
            result: output,
        })
    }

    // ------------------------------------------------------------------
    // Shared pipeline plumbing.
    // ------------------------------------------------------------------

    /// Runs the full tracked lifecycle of a training task: counters and
    /// registry entry, pipeline, then the unified cleanup. Shared by the
    /// synchronous path and the spawned asynchronous path.
    async fn start_training(
        self: &Arc<Self>,
        task: MlTask,
        request: TrainingRequest,
    ) -> Result<String, MlError> {
        let task_id = task.task_id.clone();
        let function_name = task.function_name.clone();
        let is_async = task.asynchronous;

        self.begin_task(&task, ActionName::Train);
        let result = self.training_pipeline(&task, request).await;
        self.finish_task(&task_id, &function_name, ActionName::Train, is_async, result)
            .await
    }

    async fn training_pipeline(
        &self,
        task: &MlTask,
        request: TrainingRequest,
    ) -> Result<String, MlError> {
        let TrainingRequest {
            function_name,
            parameters,
            input,
            user,
            ..
        } = request;

        let frame = self.resolve_input(input).await?;
        self.manager
            .update_task_state(&task.task_id, MlTaskState::Running, task.asynchronous)
            .await?;

        let engine = Arc::clone(&self.engine);
        let train_function = function_name.clone();
        let model = tokio::task::spawn_blocking(move || {
            engine.train(&train_function, &parameters, &frame)
        })
        .await
        .map_err(|e| MlError::EngineFailure(format!("training task panicked: {}", e)))??;

        let index_ready = self.store.create_index_if_absent(ML_MODEL_INDEX).await?;
        if !index_ready {
            return Err(MlError::PersistenceFailed(
                "no response to create ML model index".to_string(),
            ));
        }

        let ml_model = MlModel {
            name: model.name,
            algorithm: function_name.clone(),
            version: model.version,
            content: model.content,
            user,
            create_time: chrono::Utc::now(),
        };
        let doc = serde_json::to_value(&ml_model)
            .map_err(|e| MlError::PersistenceFailed(format!("failed to encode model: {}", e)))?;
        let model_id = self.store.put(ML_MODEL_INDEX, doc).await?;
        tracing::info!("Model data indexing done, model id: {}", model_id);

        self.stats.stat(ML_TOTAL_MODEL_COUNT).increment();
        self.stats
            .counter_stat_if_absent(model_count_stat(&function_name))
            .increment();
        self.manager.set_model_id(&task.task_id, model_id.clone());

        Ok(model_id)
    }

    async fn prediction_pipeline(
        &self,
        task: &MlTask,
        request: PredictionRequest,
    ) -> Result<DataFrame, MlError> {
        let PredictionRequest {
            function_name,
            parameters,
            model_id,
            input,
            user,
        } = request;

        let model_id =
            model_id.ok_or_else(|| MlError::ModelNotFound("ModelId is invalid".to_string()))?;
        let frame = self.resolve_input(input).await?;

        let doc = self
            .store
            .get(ML_MODEL_INDEX, &model_id)
            .await?
            .ok_or_else(|| MlError::model_not_found(&model_id))?;
        let ml_model: MlModel = serde_json::from_value(doc).map_err(|e| {
            MlError::PersistenceFailed(format!("corrupt model document {}: {}", model_id, e))
        })?;

        check_access(user.as_ref(), ml_model.user.as_ref(), &model_id)?;

        self.manager
            .update_task_state(&task.task_id, MlTaskState::Running, false)
            .await?;

        let engine = Arc::clone(&self.engine);
        let model = Model {
            name: ml_model.name,
            version: ml_model.version,
            content: ml_model.content,
        };
        tokio::task::spawn_blocking(move || {
            engine.predict(&function_name, &parameters, &frame, &model)
        })
        .await
        .map_err(|e| MlError::EngineFailure(format!("prediction task panicked: {}", e)))?
    }

    async fn execution_pipeline(
        &self,
        task: &MlTask,
        request: &ExecuteRequest,
    ) -> Result<serde_json::Value, MlError> {
        self.manager
            .update_task_state(&task.task_id, MlTaskState::Running, false)
            .await?;

        let engine = Arc::clone(&self.engine);
        let function_name = request.function_name.clone();
        let input = request.input.clone();
        tokio::task::spawn_blocking(move || engine.execute(&function_name, &input))
            .await
            .map_err(|e| MlError::EngineFailure(format!("execute task panicked: {}", e)))?
    }

    async fn resolve_input(&self, input: InputDataset) -> Result<DataFrame, MlError> {
        match input {
            InputDataset::DataFrame { frame } => Ok(frame),
            InputDataset::SearchQuery { query } => self.resolver.resolve(&query).await,
        }
    }

    /// Admission gate. Checked on the executing node before any task record
    /// exists, so rejected work never appears in the executing-task count.
    fn admit(&self, function_name: &str, action: ActionName) -> Result<(), MlError> {
        if let Some(breaker) = self.breakers.open_breaker() {
            let err = MlError::AdmissionRejected(format!(
                "{} circuit breaker is open, rejecting new ML work",
                breaker
            ));
            return Err(self.fail_fast(function_name, action, err));
        }
        Ok(())
    }

    /// Registers a task and bumps the request counters. From this point on,
    /// cleanup runs through `finish_task` exactly once.
    fn begin_task(&self, task: &MlTask, action: ActionName) {
        self.stats.stat(ML_EXECUTING_TASK_COUNT).increment();
        self.stats.stat(ML_TOTAL_REQUEST_COUNT).increment();
        self.stats
            .counter_stat_if_absent(request_count_stat(&task.function_name, action))
            .increment();
        self.manager.add(task.clone());
    }

    /// Unified terminal handling: on success the task moves to Completed and
    /// leaves the registry; on failure the counters are bumped once, the
    /// task is marked Failed (persisted for async tasks) and removed, and
    /// the original error is returned untouched.
    ///
    /// Failures while persisting the terminal transition are logged and
    /// swallowed: they must not resurrect the task or duplicate its record.
    async fn finish_task<T>(
        &self,
        task_id: &TaskId,
        function_name: &str,
        action: ActionName,
        is_async: bool,
        result: Result<T, MlError>,
    ) -> Result<T, MlError> {
        match result {
            Ok(value) => {
                if let Err(e) = self
                    .manager
                    .update_task_state(task_id, MlTaskState::Completed, is_async)
                    .await
                {
                    tracing::warn!("Failed to persist completion of task {}: {}", task_id.0, e);
                }
                self.manager.remove(task_id);
                Ok(value)
            }
            Err(err) => {
                self.count_failure_by_key(function_name, action);
                self.manager.set_error(task_id, err.to_string());
                if let Err(e) = self
                    .manager
                    .update_task_state(task_id, MlTaskState::Failed, is_async)
                    .await
                {
                    tracing::warn!("Failed to persist failure of task {}: {}", task_id.0, e);
                }
                self.manager.remove(task_id);
                tracing::error!("ML task {} failed: {}", task_id.0, err);
                Err(err)
            }
        }
    }

    /// Failure accounting for jobs rejected before a task record exists
    /// (admission, unknown function, dispatch, task-document creation).
    fn fail_fast(&self, function_name: &str, action: ActionName, err: MlError) -> MlError {
        self.count_failure_by_key(function_name, action);
        tracing::error!("ML job rejected before execution: {}", err);
        err
    }

    fn count_failure_by_key(&self, function_name: &str, action: ActionName) {
        self.stats.stat(ML_TOTAL_FAILURE_COUNT).increment();
        self.stats
            .counter_stat_if_absent(failure_count_stat(function_name, action))
            .increment();
    }

    // ------------------------------------------------------------------
    // Inter-node transport.
    // ------------------------------------------------------------------

    async fn forward<Req, Resp>(
        &self,
        node_id: &NodeId,
        endpoint: &str,
        request: &Req,
    ) -> Result<Resp, MlError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let member = self.cluster.get_member(node_id).ok_or_else(|| {
            MlError::DispatchFailed(format!("resolved node {:?} is not a known member", node_id))
        })?;

        let url = format!("http://{}{}", member.http_addr, endpoint);
        let response = self
            .post_with_retry(&url, request, Duration::from_secs(60), 3)
            .await
            .map_err(|e| {
                MlError::DispatchFailed(format!("failed to reach node {:?}: {}", node_id, e))
            })?;

        if response.status().is_success() {
            response.json::<Resp>().await.map_err(|e| {
                MlError::DispatchFailed(format!("bad response from node {:?}: {}", node_id, e))
            })
        } else {
            let status = response.status();
            match response.json::<ErrorBody>().await {
                Ok(body) => Err(body.into()),
                Err(_) => Err(MlError::DispatchFailed(format!(
                    "remote node {:?} returned {}",
                    node_id, status
                ))),
            }
        }
    }

    async fn post_with_retry<T: Serialize>(
        &self,
        url: &str,
        payload: &T,
        timeout: Duration,
        attempts: usize,
    ) -> anyhow::Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http_client
                .post(url)
                .json(payload)
                .timeout(timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    // Simple jitter to prevent thundering herd
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }
}

/// Authorization for prediction against a persisted model: an unowned model
/// is open to everyone; otherwise the caller must be the owner or share a
/// role with them.
pub(crate) fn check_access(
    caller: Option<&User>,
    owner: Option<&User>,
    model_id: &str,
) -> Result<(), MlError> {
    let owner = match owner {
        Some(owner) => owner,
        None => return Ok(()),
    };
    let caller = match caller {
        Some(caller) => caller,
        None => return Err(MlError::unauthorized("anonymous", model_id)),
    };
    if caller.name == owner.name || caller.roles.iter().any(|role| owner.roles.contains(role)) {
        Ok(())
    } else {
        Err(MlError::unauthorized(&caller.name, model_id))
    }
}
