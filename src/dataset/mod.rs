//! Tabular Input Data
//!
//! Defines the `DataFrame` (row/column numeric data ready for the engine) and
//! the `InputDataset` wrapper that distinguishes data delivered inline from
//! data described by a query against a stored index. Query-shaped input must
//! go through an [`resolver::InputResolver`] before the engine sees it.

pub mod resolver;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::error::MlError;

/// Shape of the input attached to a job, independent of its content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    DataFrame,
    SearchQuery,
}

/// Row-major numeric table.
///
/// Every row has exactly one value per column; `push_row` enforces the arity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataFrame {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl DataFrame {
    pub fn new(column_names: Vec<String>) -> Self {
        Self {
            column_names,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), MlError> {
        if row.len() != self.column_names.len() {
            return Err(MlError::InputResolutionFailed(format!(
                "row has {} values but the frame has {} columns",
                row.len(),
                self.column_names.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds a single-column frame, used for prediction outputs.
    pub fn single_column(name: &str, values: Vec<f64>) -> Self {
        Self {
            column_names: vec![name.to_string()],
            rows: values.into_iter().map(|v| vec![v]).collect(),
        }
    }
}

/// A query against a stored index, to be resolved into a `DataFrame`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQueryInput {
    /// Index the documents live in.
    pub index: String,
    /// Numeric fields to project into frame columns, in order.
    pub columns: Vec<String>,
    /// Cap on the number of documents read.
    pub limit: Option<usize>,
}

/// Input attached to a job descriptor: either ready-to-use tabular data or a
/// query that must first be resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputDataset {
    DataFrame { frame: DataFrame },
    SearchQuery { query: SearchQueryInput },
}

impl InputDataset {
    pub fn input_type(&self) -> InputType {
        match self {
            InputDataset::DataFrame { .. } => InputType::DataFrame,
            InputDataset::SearchQuery { .. } => InputType::SearchQuery,
        }
    }
}
