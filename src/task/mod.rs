//! ML Task Lifecycle Module
//!
//! Everything that turns a submitted ML job into a tracked, dispatched,
//! executed and accounted task. The runner owns the pipeline; the manager
//! owns the task records; the dispatcher only decides where a job runs.
//!
//! ## Submodules
//! - **`types`**: task records, lifecycle states, users and model documents.
//! - **`protocol`**: job descriptor DTOs and the public/internal endpoints.
//! - **`manager`**: the in-memory task registry plus task-document persistence.
//! - **`dispatcher`**: node selection from the cluster's resource view.
//! - **`runner`**: the generic pipeline and its train/predict/execute paths.
//! - **`handlers`**: axum handlers for the ML endpoints.

pub mod dispatcher;
pub mod handlers;
pub mod manager;
pub mod protocol;
pub mod runner;
pub mod types;

#[cfg(test)]
mod tests;
