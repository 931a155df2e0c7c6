// ============================================================================
// CORE TYPES & UTILITIES
// ============================================================================
pub mod core;

// ============================================================================
// VECTORS & ENGINES
// ============================================================================
pub mod engine;
pub mod vector;

// ============================================================================
// DISTRIBUTED ORCHESTRATION
// ============================================================================
pub mod distributed;

// ============================================================================
// RECOVERY & CHECKPOINTING
// ============================================================================
pub mod recovery;

// ============================================================================
// OBSERVABILITY & TRACING
// ============================================================================
pub mod observability;

// Re-export commonly used types
pub use crate::core::{ClusterConfig, EngineConfig, ErrorCode, Result, SwarmError};
pub use distributed::{
    AdaptiveLoadBalancer, Cluster, DistributedIndex, FailureDetector, HashSharding, NodeStatus,
    RangeSharding, RoundRobinSharding, ShardNode, ShardingStrategy,
};
pub use engine::{FlatIndexEngine, SearchResult, VectorIndexEngine, VectorKey};
pub use observability::{Span, SpanId, Tracer};
pub use recovery::{Checkpoint, CheckpointManager};
pub use vector::DistanceMetric;
