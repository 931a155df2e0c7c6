use std::time::Duration;

use crate::core::errors::{Result, SwarmError};
use crate::vector::distance::DistanceMetric;

/// Per-shard engine construction parameters.
///
/// `connectivity` and `expansion` are graph-build knobs passed through to the
/// underlying engine; the flat reference engine records but ignores them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed vector dimensionality for the cluster's lifetime
    pub dimensions: usize,
    /// Distance metric used by every shard
    pub metric: DistanceMetric,
    /// Graph connectivity parameter (neighbors per node)
    pub connectivity: usize,
    /// Search expansion factor during graph construction
    pub expansion: usize,
}

impl EngineConfig {
    pub fn new(dimensions: usize) -> Self {
        EngineConfig {
            dimensions,
            metric: DistanceMetric::Cosine,
            connectivity: 16,
            expansion: 64,
        }
    }

    /// Validate before any shard is constructed. Fails fast on bad input.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(SwarmError::ConfigError {
                message: "dimensions must be > 0".to_string(),
            });
        }
        if self.connectivity == 0 || self.expansion == 0 {
            return Err(SwarmError::ConfigError {
                message: "connectivity and expansion must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Cluster-level configuration: shard count plus health-check timing.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub num_shards: usize,
    pub engine: EngineConfig,
    /// A node whose last heartbeat is older than this is considered stale
    pub heartbeat_timeout: Duration,
    /// Period of the background failure-detection tick
    pub detection_interval: Duration,
    /// Consecutive stale detection passes before a failure is confirmed
    pub failure_threshold: usize,
}

impl ClusterConfig {
    pub fn new(num_shards: usize, dimensions: usize) -> Self {
        ClusterConfig {
            num_shards,
            engine: EngineConfig::new(dimensions),
            heartbeat_timeout: Duration::from_secs(5),
            detection_interval: Duration::from_secs(1),
            failure_threshold: 3,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(SwarmError::ConfigError {
                message: "num_shards must be > 0".to_string(),
            });
        }
        if self.failure_threshold == 0 {
            return Err(SwarmError::ConfigError {
                message: "failure_threshold must be > 0".to_string(),
            });
        }
        self.engine.validate()
    }
}
