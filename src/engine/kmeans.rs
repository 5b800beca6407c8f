//! K-Means Clustering
//!
//! Plain Lloyd's algorithm over the frame's numeric rows. Parameters:
//! `k` (default 2), `iterations` (default 10), `seed` (optional, for
//! deterministic centroid initialization). The trained model's content is the
//! serialized centroid list.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Algorithm, Model};
use crate::dataset::DataFrame;
use crate::error::MlError;

const DEFAULT_K: usize = 2;
const DEFAULT_ITERATIONS: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
struct KMeansModelContent {
    centroids: Vec<Vec<f64>>,
}

pub struct KMeans;

impl KMeans {
    fn parse_params(parameters: &Value) -> (usize, usize, Option<u64>) {
        let k = parameters
            .get("k")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_K);
        let iterations = parameters
            .get("iterations")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_ITERATIONS);
        let seed = parameters.get("seed").and_then(|v| v.as_u64());
        (k, iterations, seed)
    }

    fn nearest(centroids: &[Vec<f64>], row: &[f64]) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, centroid) in centroids.iter().enumerate() {
            let dist: f64 = centroid
                .iter()
                .zip(row.iter())
                .map(|(c, x)| (c - x) * (c - x))
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        best
    }
}

impl Algorithm for KMeans {
    fn train(&self, parameters: &Value, frame: &DataFrame) -> Result<Model, MlError> {
        let (k, iterations, seed) = Self::parse_params(parameters);

        if frame.is_empty() {
            return Err(MlError::EngineFailure(
                "kmeans training input is empty".to_string(),
            ));
        }
        if k == 0 || k > frame.len() {
            return Err(MlError::EngineFailure(format!(
                "kmeans requires 1 <= k <= row count, got k={} rows={}",
                k,
                frame.len()
            )));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Initialize with k distinct rows.
        let mut centroids: Vec<Vec<f64>> = frame
            .rows
            .choose_multiple(&mut rng, k)
            .cloned()
            .collect();

        for _ in 0..iterations {
            let mut sums = vec![vec![0.0; frame.column_names.len()]; k];
            let mut counts = vec![0usize; k];

            for row in &frame.rows {
                let cluster = Self::nearest(&centroids, row);
                counts[cluster] += 1;
                for (dim, value) in row.iter().enumerate() {
                    sums[cluster][dim] += value;
                }
            }

            for cluster in 0..k {
                // Empty clusters keep their previous centroid.
                if counts[cluster] > 0 {
                    for dim in 0..frame.column_names.len() {
                        centroids[cluster][dim] = sums[cluster][dim] / counts[cluster] as f64;
                    }
                }
            }
        }

        let content = serde_json::to_string(&KMeansModelContent { centroids })
            .map_err(|e| MlError::EngineFailure(format!("failed to serialize model: {}", e)))?;

        Ok(Model {
            name: "KMeans".to_string(),
            version: 1,
            content,
        })
    }

    fn predict(
        &self,
        _parameters: &Value,
        frame: &DataFrame,
        model: &Model,
    ) -> Result<DataFrame, MlError> {
        let content: KMeansModelContent = serde_json::from_str(&model.content)
            .map_err(|e| MlError::EngineFailure(format!("invalid kmeans model content: {}", e)))?;

        if content.centroids.is_empty() {
            return Err(MlError::EngineFailure(
                "kmeans model has no centroids".to_string(),
            ));
        }

        let assignments = frame
            .rows
            .iter()
            .map(|row| Self::nearest(&content.centroids, row) as f64)
            .collect();

        Ok(DataFrame::single_column("cluster_id", assignments))
    }
}
