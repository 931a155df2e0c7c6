/// Vector Index Engine boundary.
///
/// A shard owns exactly one engine instance. The engine is the single-node
/// ANN store; the orchestration layer treats it as opaque and only relies on
/// this trait's contract.
pub mod flat;

use std::path::Path;

use crate::core::errors::Result;

/// Opaque vector identifier, unique across the whole cluster.
/// Uniqueness is not enforced by the orchestration layer.
pub type VectorKey = u64;

/// One search hit: lower distance means closer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub key: VectorKey,
    pub distance: f32,
}

/// Core engine trait.
///
/// Implementations provide add, search, and persistence operations over a
/// single-node index. The trait keeps the orchestration layer pluggable:
/// graph-based engines and the flat reference engine satisfy the same
/// contract.
pub trait VectorIndexEngine: Send + Sync {
    /// Insert a single vector. Fails on dimension mismatch or engine limits.
    fn add(&mut self, key: VectorKey, vector: &[f32]) -> Result<()>;

    /// Insert many vectors at once. `vectors` is row-major, `keys.len()`
    /// rows. Atomic within the engine: either all rows land or none.
    fn add_batch(&mut self, keys: &[VectorKey], vectors: &[f32]) -> Result<()>;

    /// Top-k nearest neighbors, ascending by distance, length <= k.
    /// An empty index yields an empty result.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Persist the full engine state to a file.
    fn save(&self, path: &Path) -> Result<()>;

    /// Replace the engine state with a previously saved file.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Number of vectors currently stored.
    fn size(&self) -> usize;

    /// Fixed dimensionality of every stored vector.
    fn dimensions(&self) -> usize;
}

pub use flat::FlatIndexEngine;
