//! Cluster Membership Module
//!
//! Node identity and discovery for the ML cluster. Members exchange periodic
//! HTTP heartbeats carrying resource telemetry (free memory), which is what
//! the task dispatcher consults when deciding where a job should run.
//!
//! ## Submodules
//! - **`types`**: node identity and member records.
//! - **`protocol`**: join/heartbeat DTOs and endpoint constants.
//! - **`service`**: the member table, heartbeat loop, and failure detection.
//! - **`handlers`**: axum handlers for the membership endpoints.

pub mod handlers;
pub mod protocol;
pub mod service;
pub mod types;
