/// Flat (exact brute-force) reference engine.
///
/// Scans every stored vector on search. Slow for large shards but exact,
/// dependency-free, and byte-for-byte restorable, which makes it the
/// reference implementation for the orchestration layer and its tests.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;
use crate::core::errors::{ErrorCode, Result, SwarmError};
use crate::engine::{SearchResult, VectorIndexEngine, VectorKey};
use crate::vector::distance::DistanceMetric;

/// On-disk snapshot of the full engine state.
#[derive(Debug, Serialize, Deserialize)]
struct FlatSnapshot {
    dimensions: usize,
    metric: DistanceMetric,
    keys: Vec<VectorKey>,
    data: Vec<f32>,
}

pub struct FlatIndexEngine {
    dimensions: usize,
    metric: DistanceMetric,
    keys: Vec<VectorKey>,
    /// Row-major storage, one row of `dimensions` floats per key
    data: Vec<f32>,
}

impl FlatIndexEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(FlatIndexEngine {
            dimensions: config.dimensions,
            metric: config.metric,
            keys: Vec::new(),
            data: Vec::new(),
        })
    }

    fn check_dimensions(&self, len: usize) -> Result<()> {
        if len != self.dimensions {
            return Err(SwarmError::VectorDimensionMismatch {
                expected: self.dimensions,
                got: len,
            });
        }
        Ok(())
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dimensions..(i + 1) * self.dimensions]
    }

    fn io_err(context: &str, e: impl std::fmt::Display) -> SwarmError {
        SwarmError::StorageError {
            code: ErrorCode::StorageIOError,
            message: format!("{}: {}", context, e),
        }
    }
}

impl VectorIndexEngine for FlatIndexEngine {
    fn add(&mut self, key: VectorKey, vector: &[f32]) -> Result<()> {
        self.check_dimensions(vector.len())?;
        self.keys.push(key);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    fn add_batch(&mut self, keys: &[VectorKey], vectors: &[f32]) -> Result<()> {
        if keys.len() * self.dimensions != vectors.len() {
            return Err(SwarmError::VectorDimensionMismatch {
                expected: keys.len() * self.dimensions,
                got: vectors.len(),
            });
        }
        // Validated up front, so the extend below cannot half-apply.
        self.keys.extend_from_slice(keys);
        self.data.extend_from_slice(vectors);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_dimensions(query.len())?;
        let mut results: Vec<SearchResult> = self
            .keys
            .iter()
            .enumerate()
            .map(|(i, &key)| SearchResult {
                key,
                distance: self.metric.distance(query, self.row(i)),
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);
        Ok(results)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let snapshot = FlatSnapshot {
            dimensions: self.dimensions,
            metric: self.metric,
            keys: self.keys.clone(),
            data: self.data.clone(),
        };
        let file = File::create(path).map_err(|e| Self::io_err("File create error", e))?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &snapshot)
            .map_err(|e| Self::io_err("Serialize error", e))?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Self::io_err("File open error", e))?;
        let reader = BufReader::new(file);
        let snapshot: FlatSnapshot =
            bincode::deserialize_from(reader).map_err(|e| Self::io_err("Deserialize error", e))?;
        if snapshot.dimensions != self.dimensions {
            return Err(SwarmError::VectorDimensionMismatch {
                expected: self.dimensions,
                got: snapshot.dimensions,
            });
        }
        self.metric = snapshot.metric;
        self.keys = snapshot.keys;
        self.data = snapshot.data;
        Ok(())
    }

    fn size(&self) -> usize {
        self.keys.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
