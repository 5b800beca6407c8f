use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cluster::types::NodeId;
use crate::dataset::InputType;

/// Unique identifier for an ML task.
///
/// Synchronous tasks get a locally generated id; asynchronous tasks take the
/// id of their persisted task document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MlTaskType {
    Training,
    Prediction,
    Execution,
}

/// Lifecycle state of a task. Transitions only move forward:
/// `Created -> Running -> {Completed | Failed}`, and `Created -> Failed` when
/// a task dies before it ever runs. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MlTaskState {
    Created,
    Running,
    Completed,
    Failed,
}

impl MlTaskState {
    /// Wire spelling of the state, matching its serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            MlTaskState::Created => "CREATED",
            MlTaskState::Running => "RUNNING",
            MlTaskState::Completed => "COMPLETED",
            MlTaskState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MlTaskState::Completed | MlTaskState::Failed)
    }

    /// Whether moving to `next` respects the forward-only state machine.
    pub fn can_advance_to(&self, next: MlTaskState) -> bool {
        match self {
            MlTaskState::Created => matches!(
                next,
                MlTaskState::Running | MlTaskState::Completed | MlTaskState::Failed
            ),
            MlTaskState::Running => next.is_terminal(),
            MlTaskState::Completed | MlTaskState::Failed => false,
        }
    }
}

/// The unit of work tracked end-to-end by the task manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlTask {
    pub task_id: TaskId,
    pub task_type: MlTaskType,
    pub function_name: String,
    pub input_type: InputType,
    pub state: MlTaskState,
    pub worker_node: NodeId,
    pub asynchronous: bool,
    pub model_id: Option<String>,
    pub error: Option<String>,
    pub create_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
}

impl MlTask {
    pub fn new(
        task_type: MlTaskType,
        function_name: String,
        input_type: InputType,
        worker_node: NodeId,
        asynchronous: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: TaskId::new(),
            task_type,
            function_name,
            input_type,
            state: MlTaskState::Created,
            worker_node,
            asynchronous,
            model_id: None,
            error: None,
            create_time: now,
            last_update_time: now,
        }
    }
}

/// Caller identity, carried explicitly on job descriptors from submission
/// through authorization and persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    pub fn new(name: &str, roles: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// A persisted model document: the engine's output wrapped with algorithm
/// and ownership metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlModel {
    pub name: String,
    pub algorithm: String,
    pub version: i64,
    pub content: String,
    pub user: Option<User>,
    pub create_time: DateTime<Utc>,
}
