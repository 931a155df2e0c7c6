/// Distributed orchestration layer
///
/// Provides:
/// - Hash, round-robin, and range sharding strategies
/// - Shard nodes wrapping independent engine instances
/// - Batched writes and fan-out/merge reads across shards
/// - Adaptive load balancing with latency-aware selection
/// - Heartbeat-based failure detection

pub mod balancer;
pub mod cluster;
pub mod failure;
pub mod index;
pub mod shard_node;
pub mod strategy;

pub use balancer::{AdaptiveLoadBalancer, ShardStatsSnapshot};
pub use cluster::Cluster;
pub use failure::{FailureCallback, FailureDetector, NodeStatus};
pub use index::DistributedIndex;
pub use shard_node::ShardNode;
pub use strategy::{HashSharding, RangeSharding, RoundRobinSharding, ShardingStrategy};
