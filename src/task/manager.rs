//! Task Manager
//!
//! The in-memory task registry, and the only component allowed to mutate
//! task state. Synchronous tasks live purely in the map for the duration of
//! the request; asynchronous tasks are additionally persisted as documents in
//! the task index so callers can poll them after the initial response.

use std::sync::Arc;

use serde_json::Value;

use super::types::{MlTask, MlTaskState, TaskId};
use crate::error::MlError;
use crate::store::{DocumentStore, ML_TASK_INDEX};

use chrono::Utc;
use dashmap::DashMap;

pub struct TaskManager {
    tasks: DashMap<TaskId, MlTask>,
    store: Arc<dyn DocumentStore>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            tasks: DashMap::new(),
            store,
        })
    }

    /// Persists a task record and assigns it the stored document's id.
    ///
    /// Only asynchronous tasks go through here; synchronous tasks keep their
    /// locally generated id and are never written to the store.
    pub async fn create_task(&self, task: &mut MlTask) -> Result<TaskId, MlError> {
        let created = self.store.create_index_if_absent(ML_TASK_INDEX).await?;
        if !created {
            return Err(MlError::PersistenceFailed(
                "no response to create ML task index".to_string(),
            ));
        }

        let doc = serde_json::to_value(&*task)
            .map_err(|e| MlError::PersistenceFailed(format!("failed to encode task: {}", e)))?;
        let doc_id = self.store.put(ML_TASK_INDEX, doc).await?;

        task.task_id = TaskId(doc_id.clone());
        // Rewrite the document so it carries its own id.
        self.persist(task).await?;

        tracing::debug!("Created ML task document {}", doc_id);
        Ok(TaskId(doc_id))
    }

    /// Inserts a task into the in-memory registry.
    ///
    /// A duplicate task id is a broken local invariant (ids are unique for
    /// the registry's lifetime), so this panics rather than limping on.
    pub fn add(&self, task: MlTask) {
        let task_id = task.task_id.clone();
        let previous = self.tasks.insert(task_id.clone(), task);
        if previous.is_some() {
            panic!("duplicate task id: {}", task_id.0);
        }
    }

    /// Advances a task's state, persisting the change for asynchronous
    /// tasks. Backward transitions are refused and logged; the in-memory
    /// record is left untouched.
    pub async fn update_task_state(
        &self,
        task_id: &TaskId,
        state: MlTaskState,
        is_async: bool,
    ) -> Result<(), MlError> {
        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => {
                    tracing::warn!("Cannot update state of unknown task {}", task_id.0);
                    return Ok(());
                }
            };
            if !entry.state.can_advance_to(state) {
                tracing::error!(
                    "Refusing backward task transition {} {:?} -> {:?}",
                    task_id.0,
                    entry.state,
                    state
                );
                return Ok(());
            }
            entry.state = state;
            entry.last_update_time = Utc::now();
            entry.clone()
        };

        if is_async {
            self.persist(&snapshot).await?;
        }
        Ok(())
    }

    /// Records the persisted model id on an in-memory task.
    pub fn set_model_id(&self, task_id: &TaskId, model_id: String) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            entry.model_id = Some(model_id);
            entry.last_update_time = Utc::now();
        }
    }

    /// Records a failure message on an in-memory task.
    pub fn set_error(&self, task_id: &TaskId, message: String) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            entry.error = Some(message);
            entry.last_update_time = Utc::now();
        }
    }

    /// Evicts a task from memory. Idempotent: both the success and the
    /// failure cleanup paths call this, sometimes for the same id.
    pub fn remove(&self, task_id: &TaskId) {
        self.tasks.remove(task_id);
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn get(&self, task_id: &TaskId) -> Option<MlTask> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Resolves a task for status polling: the in-memory registry first,
    /// then the task index (where asynchronous tasks outlive their run).
    pub async fn get_task(&self, task_id: &TaskId) -> Result<Option<MlTask>, MlError> {
        if let Some(task) = self.get(task_id) {
            return Ok(Some(task));
        }
        match self.store.get(ML_TASK_INDEX, &task_id.0).await? {
            Some(doc) => {
                let task = serde_json::from_value(doc).map_err(|e| {
                    MlError::PersistenceFailed(format!("corrupt task document: {}", e))
                })?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn persist(&self, task: &MlTask) -> Result<(), MlError> {
        let doc: Value = serde_json::to_value(task)
            .map_err(|e| MlError::PersistenceFailed(format!("failed to encode task: {}", e)))?;
        self.store.update(ML_TASK_INDEX, &task.task_id.0, doc).await
    }
}
