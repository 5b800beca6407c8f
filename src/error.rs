//! Crate-wide Error Taxonomy
//!
//! Every failure the orchestration layer can produce maps onto exactly one of
//! these categories, so callers can tell an admission rejection apart from a
//! missing model or a plain engine failure. The categories survive the HTTP
//! boundary: a forwarded task that fails on a remote node comes back with the
//! same `error_type` it was raised with.

use serde::{Deserialize, Serialize};

/// Failure categories for ML task orchestration.
///
/// Each variant carries the final human-readable message. Use the constructor
/// helpers (`unauthorized`, `unsupported_algorithm`, ...) where a message has
/// a fixed shape, so the same wording is produced everywhere.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MlError {
    /// The circuit breaker is open; no new work is admitted on this node.
    #[error("{0}")]
    AdmissionRejected(String),

    /// No node could be resolved for the task, or the forwarded request
    /// failed at the transport level.
    #[error("{0}")]
    DispatchFailed(String),

    /// A query-shaped input could not be turned into tabular data.
    #[error("{0}")]
    InputResolutionFailed(String),

    /// The caller is not allowed to use the referenced model.
    #[error("{0}")]
    UnauthorizedAccess(String),

    /// The referenced model id resolves to no stored document.
    #[error("{0}")]
    ModelNotFound(String),

    /// The requested function name is not registered in the engine.
    #[error("{0}")]
    UnsupportedAlgorithm(String),

    /// Catch-all for failures inside training/prediction/execution.
    #[error("{0}")]
    EngineFailure(String),

    /// The document store rejected an index/put/get/update operation.
    #[error("{0}")]
    PersistenceFailed(String),
}

impl MlError {
    pub fn unauthorized(user: &str, model_id: &str) -> Self {
        MlError::UnauthorizedAccess(format!(
            "User: {} does not have permissions to run predict by model: {}",
            user, model_id
        ))
    }

    pub fn unsupported_algorithm(name: &str) -> Self {
        MlError::UnsupportedAlgorithm(format!("Unsupported algorithm: {}", name))
    }

    pub fn model_not_found(model_id: &str) -> Self {
        MlError::ModelNotFound(format!("no model found for model id: {}", model_id))
    }

    /// Stable identifier used on the wire and in stats/log output.
    pub fn error_type(&self) -> &'static str {
        match self {
            MlError::AdmissionRejected(_) => "admission_rejected",
            MlError::DispatchFailed(_) => "dispatch_failed",
            MlError::InputResolutionFailed(_) => "input_resolution_failed",
            MlError::UnauthorizedAccess(_) => "unauthorized_access",
            MlError::ModelNotFound(_) => "model_not_found",
            MlError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            MlError::EngineFailure(_) => "engine_failure",
            MlError::PersistenceFailed(_) => "persistence_failed",
        }
    }

    /// Rebuilds the typed error from its wire form.
    ///
    /// Unknown categories degrade to `EngineFailure` rather than dropping the
    /// message.
    pub fn from_wire(error_type: &str, message: String) -> Self {
        match error_type {
            "admission_rejected" => MlError::AdmissionRejected(message),
            "dispatch_failed" => MlError::DispatchFailed(message),
            "input_resolution_failed" => MlError::InputResolutionFailed(message),
            "unauthorized_access" => MlError::UnauthorizedAccess(message),
            "model_not_found" => MlError::ModelNotFound(message),
            "unsupported_algorithm" => MlError::UnsupportedAlgorithm(message),
            "persistence_failed" => MlError::PersistenceFailed(message),
            _ => MlError::EngineFailure(message),
        }
    }
}

/// JSON body returned for every failed request, public or internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_type: String,
    pub message: String,
}

impl From<&MlError> for ErrorBody {
    fn from(err: &MlError) -> Self {
        Self {
            error_type: err.error_type().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ErrorBody> for MlError {
    fn from(body: ErrorBody) -> Self {
        MlError::from_wire(&body.error_type, body.message)
    }
}
