//! ML Engine
//!
//! The pluggable component that does the actual computation. Algorithms are
//! registered under their function name; the runner never names an algorithm,
//! it only routes `function_name` strings into this registry.
//!
//! Two capability sets exist:
//! - [`Algorithm`]: trainable functions (`train` + `predict` over tabular
//!   input, producing / consuming a serialized [`Model`]).
//! - [`Executable`]: stateless functions run against ad-hoc JSON input with
//!   no persisted artifact.
//!
//! Engine calls are synchronous and CPU-bound; the task runner confines them
//! to the blocking worker pool.

pub mod kmeans;
pub mod sample_calculator;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::dataset::DataFrame;
use crate::error::MlError;

/// Output of a training run, before it is wrapped and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub version: i64,
    /// Serialized model state (JSON blob).
    pub content: String,
}

/// A trainable function.
pub trait Algorithm: Send + Sync {
    fn train(&self, parameters: &Value, frame: &DataFrame) -> Result<Model, MlError>;

    fn predict(
        &self,
        parameters: &Value,
        frame: &DataFrame,
        model: &Model,
    ) -> Result<DataFrame, MlError>;
}

/// A stateless function with no model.
pub trait Executable: Send + Sync {
    fn execute(&self, input: &Value) -> Result<Value, MlError>;
}

/// Function-name registry over both capability sets.
pub struct MlEngine {
    algorithms: DashMap<String, Arc<dyn Algorithm>>,
    executables: DashMap<String, Arc<dyn Executable>>,
}

impl MlEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            algorithms: DashMap::new(),
            executables: DashMap::new(),
        })
    }

    /// Engine with the built-in functions registered.
    pub fn with_builtins() -> Arc<Self> {
        let engine = Self::new();
        engine.register_algorithm("kmeans", Arc::new(kmeans::KMeans));
        engine.register_executable(
            "local_sample_calculator",
            Arc::new(sample_calculator::LocalSampleCalculator),
        );
        engine
    }

    pub fn register_algorithm(&self, function_name: &str, algorithm: Arc<dyn Algorithm>) {
        self.algorithms.insert(function_name.to_string(), algorithm);
        tracing::info!("Registered trainable function: {}", function_name);
    }

    pub fn register_executable(&self, function_name: &str, executable: Arc<dyn Executable>) {
        self.executables
            .insert(function_name.to_string(), executable);
        tracing::info!("Registered executable function: {}", function_name);
    }

    pub fn supports_algorithm(&self, function_name: &str) -> bool {
        self.algorithms.contains_key(function_name)
    }

    pub fn supports_executable(&self, function_name: &str) -> bool {
        self.executables.contains_key(function_name)
    }

    pub fn train(
        &self,
        function_name: &str,
        parameters: &Value,
        frame: &DataFrame,
    ) -> Result<Model, MlError> {
        let algorithm = self
            .algorithms
            .get(function_name)
            .ok_or_else(|| MlError::unsupported_algorithm(function_name))?;
        algorithm.train(parameters, frame)
    }

    pub fn predict(
        &self,
        function_name: &str,
        parameters: &Value,
        frame: &DataFrame,
        model: &Model,
    ) -> Result<DataFrame, MlError> {
        let algorithm = self
            .algorithms
            .get(function_name)
            .ok_or_else(|| MlError::unsupported_algorithm(function_name))?;
        algorithm.predict(parameters, frame, model)
    }

    pub fn execute(&self, function_name: &str, input: &Value) -> Result<Value, MlError> {
        let executable = self
            .executables
            .get(function_name)
            .ok_or_else(|| MlError::unsupported_algorithm(function_name))?;
        executable.execute(input)
    }
}
