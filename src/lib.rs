//! Distributed ML Task Orchestration Library
//!
//! This library crate defines the core modules of the ML cluster node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems:
//!
//! - **`cluster`**: The membership layer. Nodes exchange HTTP heartbeats
//!   carrying resource telemetry, which feeds the task dispatcher.
//! - **`task`**: The task lifecycle engine. Tracks every ML job from
//!   submission through dispatch, execution and terminal state, with one
//!   unified failure path per job.
//! - **`engine`**: The algorithm registry and its built-in functions
//!   (k-means training/prediction, the sample calculator).
//! - **`dataset`**: Tabular input data and the resolver that turns
//!   query-shaped input into frames the engine can consume.
//! - **`store`**: The document store holding model and task documents.
//! - **`stats`**: Monotone operational counters, global and per-function.
//! - **`breaker`**: Circuit breakers gating admission of new ML work.
//! - **`error`**: The failure taxonomy shared across all of the above.

pub mod breaker;
pub mod cluster;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod server;
pub mod stats;
pub mod store;
pub mod task;
