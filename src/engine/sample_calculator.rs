//! Local Sample Calculator
//!
//! Built-in executable function: a pure numeric reduction over an input
//! vector. Input shape:
//! `{"operation": "sum" | "mean" | "max" | "min", "input_data": [..]}`.

use serde::Deserialize;
use serde_json::{json, Value};

use super::Executable;
use crate::error::MlError;

#[derive(Debug, Deserialize)]
struct CalculatorInput {
    operation: String,
    input_data: Vec<f64>,
}

pub struct LocalSampleCalculator;

impl Executable for LocalSampleCalculator {
    fn execute(&self, input: &Value) -> Result<Value, MlError> {
        let input: CalculatorInput = serde_json::from_value(input.clone())
            .map_err(|e| MlError::EngineFailure(format!("invalid calculator input: {}", e)))?;

        if input.input_data.is_empty() {
            return Err(MlError::EngineFailure(
                "calculator input_data is empty".to_string(),
            ));
        }

        let result = match input.operation.as_str() {
            "sum" => input.input_data.iter().sum(),
            "mean" => input.input_data.iter().sum::<f64>() / input.input_data.len() as f64,
            "max" => input.input_data.iter().cloned().fold(f64::MIN, f64::max),
            "min" => input.input_data.iter().cloned().fold(f64::MAX, f64::min),
            other => {
                return Err(MlError::EngineFailure(format!(
                    "unsupported calculator operation: {}",
                    other
                )))
            }
        };

        Ok(json!({ "result": result }))
    }
}
