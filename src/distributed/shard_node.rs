/// One shard: a thread-safe wrapper around a single engine instance.
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::errors::Result;
use crate::engine::{SearchResult, VectorIndexEngine, VectorKey};

/// Serializes all index operations on one shard behind a single lock.
/// Operations on different shards never block each other; that independence
/// is where cluster-level parallelism comes from.
pub struct ShardNode {
    shard_id: usize,
    dimensions: usize,
    engine: Mutex<Box<dyn VectorIndexEngine>>,
    query_count: AtomicU64,
}

impl ShardNode {
    pub fn new(shard_id: usize, engine: Box<dyn VectorIndexEngine>) -> Self {
        let dimensions = engine.dimensions();
        ShardNode {
            shard_id,
            dimensions,
            engine: Mutex::new(engine),
            query_count: AtomicU64::new(0),
        }
    }

    /// Insert a single vector.
    pub fn add(&self, key: VectorKey, vector: &[f32]) -> Result<()> {
        self.engine.lock().add(key, vector)
    }

    /// Insert many vectors in one critical section. No partial state is
    /// visible to concurrent readers of this shard.
    pub fn add_batch(&self, keys: &[VectorKey], vectors: &[f32]) -> Result<()> {
        self.engine.lock().add_batch(keys, vectors)
    }

    /// Top-k search on this shard, ascending by distance. Bumps the shard's
    /// query counter (diagnostics only).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.engine.lock().search(query, k)
    }

    /// Persist this shard's engine state. Blocks concurrent shard
    /// operations for the duration of the save.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.engine.lock().save(path)
    }

    /// Replace this shard's engine state from a saved file.
    pub fn load(&self, path: &Path) -> Result<()> {
        self.engine.lock().load(path)
    }

    pub fn size(&self) -> usize {
        self.engine.lock().size()
    }

    pub fn shard_id(&self) -> usize {
        self.shard_id
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }
}
