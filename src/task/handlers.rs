//! HTTP handlers for the ML surface.
//!
//! Public endpoints route through dispatch; `/internal/` endpoints execute
//! locally and are what forwarded jobs land on. Failures always serialize as
//! an [`ErrorBody`] so the coordinator can rebuild the error category after
//! a hop.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::Value;

use super::protocol::{ExecuteRequest, PredictionRequest, TrainingRequest};
use super::runner::TaskRunner;
use super::types::TaskId;
use crate::error::{ErrorBody, MlError};
use crate::stats::MlStats;

fn error_status(err: &MlError) -> StatusCode {
    match err {
        MlError::AdmissionRejected(_) => StatusCode::TOO_MANY_REQUESTS,
        MlError::UnauthorizedAccess(_) => StatusCode::FORBIDDEN,
        MlError::ModelNotFound(_) => StatusCode::NOT_FOUND,
        MlError::UnsupportedAlgorithm(_) | MlError::InputResolutionFailed(_) => {
            StatusCode::BAD_REQUEST
        }
        MlError::DispatchFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        MlError::EngineFailure(_) | MlError::PersistenceFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: &MlError) -> (StatusCode, Json<Value>) {
    let body = ErrorBody::from(err);
    (
        error_status(err),
        Json(serde_json::json!({
            "error_type": body.error_type,
            "message": body.message,
        })),
    )
}

fn to_response<T: serde::Serialize>(
    ok_status: StatusCode,
    result: Result<T, MlError>,
) -> (StatusCode, Json<Value>) {
    match result {
        Ok(body) => match serde_json::to_value(&body) {
            Ok(value) => (ok_status, Json(value)),
            Err(e) => {
                error_response(&MlError::EngineFailure(format!(
                    "failed to encode response: {}",
                    e
                )))
            }
        },
        Err(err) => error_response(&err),
    }
}

pub async fn handle_train(
    Extension(runner): Extension<Arc<TaskRunner>>,
    Json(req): Json<TrainingRequest>,
) -> (StatusCode, Json<Value>) {
    let asynchronous = req.asynchronous;
    let result = runner.dispatch_train(req).await;
    let ok_status = if asynchronous {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    to_response(ok_status, result)
}

pub async fn handle_predict(
    Extension(runner): Extension<Arc<TaskRunner>>,
    Json(req): Json<PredictionRequest>,
) -> (StatusCode, Json<Value>) {
    to_response(StatusCode::OK, runner.dispatch_predict(req).await)
}

pub async fn handle_execute(
    Extension(runner): Extension<Arc<TaskRunner>>,
    Json(req): Json<ExecuteRequest>,
) -> (StatusCode, Json<Value>) {
    to_response(StatusCode::OK, runner.dispatch_execute(req).await)
}

pub async fn handle_internal_train(
    Extension(runner): Extension<Arc<TaskRunner>>,
    Json(req): Json<TrainingRequest>,
) -> (StatusCode, Json<Value>) {
    let asynchronous = req.asynchronous;
    let result = runner.run_train(req).await;
    let ok_status = if asynchronous {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    to_response(ok_status, result)
}

pub async fn handle_internal_predict(
    Extension(runner): Extension<Arc<TaskRunner>>,
    Json(req): Json<PredictionRequest>,
) -> (StatusCode, Json<Value>) {
    to_response(StatusCode::OK, runner.run_predict(req).await)
}

pub async fn handle_internal_execute(
    Extension(runner): Extension<Arc<TaskRunner>>,
    Json(req): Json<ExecuteRequest>,
) -> (StatusCode, Json<Value>) {
    to_response(StatusCode::OK, runner.run_execute(req).await)
}

/// Task status polling: the live registry first, then the task index where
/// asynchronous tasks keep their record after completion.
pub async fn handle_get_task(
    Extension(runner): Extension<Arc<TaskRunner>>,
    Path(task_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let lookup = runner.manager().get_task(&TaskId(task_id.clone())).await;
    match lookup {
        Ok(Some(task)) => to_response(StatusCode::OK, Ok(task)),
        Ok(None) => error_response(&MlError::ModelNotFound(format!(
            "Fail to find task: {}",
            task_id
        ))),
        Err(err) => error_response(&err),
    }
}

pub async fn handle_stats(
    Extension(stats): Extension<Arc<MlStats>>,
) -> (StatusCode, Json<Value>) {
    to_response(StatusCode::OK, Ok::<_, MlError>(stats.snapshot()))
}
