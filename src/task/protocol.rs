//! ML Task Protocol Definitions
//!
//! Job descriptors and response DTOs for the three job kinds, plus the
//! endpoint constants. Public endpoints go through dispatch (the receiving
//! node may forward); the `/internal/` variants are what forwarded requests
//! land on, and execute locally without re-dispatching.
//!
//! Job descriptors are immutable once submitted; the runner clones what it
//! needs and never writes back into a request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::User;
use crate::dataset::InputDataset;

pub const ENDPOINT_TRAIN: &str = "/ml/train";
pub const ENDPOINT_PREDICT: &str = "/ml/predict";
pub const ENDPOINT_EXECUTE: &str = "/ml/execute";
pub const ENDPOINT_INTERNAL_TRAIN: &str = "/internal/ml/train";
pub const ENDPOINT_INTERNAL_PREDICT: &str = "/internal/ml/predict";
pub const ENDPOINT_INTERNAL_EXECUTE: &str = "/internal/ml/execute";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub function_name: String,
    #[serde(default)]
    pub parameters: Value,
    pub input: InputDataset,
    /// When true, the caller gets a task handle immediately and polls for
    /// completion instead of waiting for the model.
    #[serde(default)]
    pub asynchronous: bool,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub function_name: String,
    #[serde(default)]
    pub parameters: Value,
    pub model_id: Option<String>,
    pub input: InputDataset,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub function_name: String,
    pub input: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResponse {
    /// Echoed task id for asynchronous jobs; absent for synchronous ones.
    pub task_id: Option<String>,
    pub status: String,
    /// Persisted model id; absent until an asynchronous job completes.
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub status: String,
    pub predictions: crate::dataset::DataFrame,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub function_name: String,
    pub result: Value,
}
