/// Distributed index: batched writes and fan-out reads across shards.
///
/// Owns N shard nodes and one sharding strategy. Writes are grouped by
/// destination shard and dispatched in parallel; reads fan out to the probed
/// shards, and partial results are merged into one global top-k.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::config::ClusterConfig;
use crate::core::errors::{Result, SwarmError};
use crate::distributed::shard_node::ShardNode;
use crate::distributed::strategy::ShardingStrategy;
use crate::engine::{FlatIndexEngine, SearchResult, VectorKey};

/// Per-shard diagnostics snapshot.
#[derive(Debug, Clone)]
pub struct ShardDiagnostics {
    pub shard_id: usize,
    pub size: usize,
    pub query_count: u64,
}

pub struct DistributedIndex {
    shards: Vec<Arc<ShardNode>>,
    strategy: Box<dyn ShardingStrategy>,
    dimensions: usize,
    total_queries: AtomicU64,
}

impl DistributedIndex {
    /// Build an index with one flat engine per shard.
    pub fn new(strategy: Box<dyn ShardingStrategy>, config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        let shards = (0..config.num_shards)
            .map(|id| {
                let engine = FlatIndexEngine::new(&config.engine)?;
                Ok(Arc::new(ShardNode::new(id, Box::new(engine))))
            })
            .collect::<Result<Vec<_>>>()?;
        info!(
            num_shards = config.num_shards,
            strategy = strategy.name(),
            "created distributed index"
        );
        Ok(DistributedIndex {
            shards,
            strategy,
            dimensions: config.engine.dimensions,
            total_queries: AtomicU64::new(0),
        })
    }

    /// Build an index over externally constructed shards (pluggable engines).
    pub fn from_shards(strategy: Box<dyn ShardingStrategy>, shards: Vec<Arc<ShardNode>>) -> Self {
        let dimensions = shards.first().map(|s| s.dimensions()).unwrap_or(0);
        DistributedIndex {
            shards,
            strategy,
            dimensions,
            total_queries: AtomicU64::new(0),
        }
    }

    /// Route one vector to its owning shard and insert it.
    pub fn add(&self, key: VectorKey, vector: &[f32]) -> Result<()> {
        let shard_id = self.strategy.shard_id(key);
        self.shards[shard_id].add(key, vector)
    }

    /// Batched insert: partition by destination shard (preserving per-shard
    /// relative order), then dispatch one add_batch per non-empty group in
    /// parallel and wait for all of them. A failed group does not stop the
    /// others; if any group failed the whole call reports failure, with no
    /// rollback of the groups that succeeded.
    pub fn add_batch(&self, keys: &[VectorKey], vectors: &[f32]) -> Result<()> {
        if keys.len() * self.dimensions != vectors.len() {
            return Err(SwarmError::VectorDimensionMismatch {
                expected: keys.len() * self.dimensions,
                got: vectors.len(),
            });
        }

        let mut groups: Vec<(Vec<VectorKey>, Vec<f32>)> =
            vec![(Vec::new(), Vec::new()); self.shards.len()];
        for (i, &key) in keys.iter().enumerate() {
            let shard_id = self.strategy.shard_id(key);
            let row = &vectors[i * self.dimensions..(i + 1) * self.dimensions];
            groups[shard_id].0.push(key);
            groups[shard_id].1.extend_from_slice(row);
        }

        let failures: Vec<(usize, SwarmError)> = groups
            .par_iter()
            .enumerate()
            .filter(|(_, (group_keys, _))| !group_keys.is_empty())
            .filter_map(|(shard_id, (group_keys, group_vectors))| {
                match self.shards[shard_id].add_batch(group_keys, group_vectors) {
                    Ok(()) => None,
                    Err(e) => Some((shard_id, e)),
                }
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            for (shard_id, e) in &failures {
                warn!(shard_id, error = %e, "batch insert failed on shard");
            }
            Err(SwarmError::DistributedError {
                message: format!("batch insert failed on {} shard group(s)", failures.len()),
            })
        }
    }

    /// Fan-out search: query `n_probe` shards in parallel for `k` results
    /// each, then merge into one global top-k. `n_probe` of 0 (or anything
    /// above the shard count) means "all shards". A shard that errors during
    /// the fan-out contributes zero results to this call.
    pub fn search(&self, query: &[f32], k: usize, n_probe: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimensions {
            return Err(SwarmError::VectorDimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        self.total_queries.fetch_add(1, Ordering::Relaxed);

        let n_probe = if n_probe == 0 || n_probe > self.shards.len() {
            self.shards.len()
        } else {
            n_probe
        };
        let targets = self.strategy.target_shards(query, n_probe);

        let partials: Vec<SearchResult> = targets
            .par_iter()
            .flat_map_iter(|&shard_id| match self.shards[shard_id].search(query, k) {
                Ok(results) => results,
                Err(e) => {
                    warn!(shard_id, error = %e, "shard search failed; treating as empty");
                    Vec::new()
                }
            })
            .collect();

        debug!(
            probed = targets.len(),
            candidates = partials.len(),
            "fan-out search complete"
        );
        Ok(merge_shard_results(partials, k))
    }

    /// Save every shard to `{base}_shard_{id}.bin`. Fails fast on the first
    /// shard I/O error without attempting the remaining shards.
    pub fn save_all(&self, base_path: &Path) -> Result<()> {
        for shard in &self.shards {
            let path = shard_file(base_path, shard.shard_id());
            shard.save(&path)?;
        }
        Ok(())
    }

    /// Load every shard from `{base}_shard_{id}.bin`. Fail-fast, same as
    /// save_all.
    pub fn load_all(&self, base_path: &Path) -> Result<()> {
        for shard in &self.shards {
            let path = shard_file(base_path, shard.shard_id());
            shard.load(&path)?;
        }
        Ok(())
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn shard(&self, shard_id: usize) -> Option<&Arc<ShardNode>> {
        self.shards.get(shard_id)
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries.load(Ordering::Relaxed)
    }

    /// Total vectors across all shards.
    pub fn size(&self) -> usize {
        self.shards.iter().map(|s| s.size()).sum()
    }

    pub fn shard_diagnostics(&self) -> Vec<ShardDiagnostics> {
        self.shards
            .iter()
            .map(|s| ShardDiagnostics {
                shard_id: s.shard_id(),
                size: s.size(),
                query_count: s.query_count(),
            })
            .collect()
    }
}

fn shard_file(base_path: &Path, shard_id: usize) -> PathBuf {
    PathBuf::from(format!("{}_shard_{}.bin", base_path.display(), shard_id))
}

/// Merge per-shard partial results into a global top-k.
///
/// Duplicates (the same key returned by several shards) collapse to the
/// minimum-distance entry, then the survivors are ordered ascending by
/// distance (ties broken by key for determinism) and truncated to `k`.
pub(crate) fn merge_shard_results(partials: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
    use std::collections::HashMap;

    let mut best: HashMap<VectorKey, f32> = HashMap::with_capacity(partials.len());
    for result in partials {
        best.entry(result.key)
            .and_modify(|d| {
                if result.distance < *d {
                    *d = result.distance;
                }
            })
            .or_insert(result.distance);
    }

    let mut merged: Vec<SearchResult> = best
        .into_iter()
        .map(|(key, distance)| SearchResult { key, distance })
        .collect();
    merged.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.key.cmp(&b.key))
    });
    merged.truncate(k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::strategy::{HashSharding, RangeSharding, RoundRobinSharding};
    use crate::vector::distance::DistanceMetric;

    fn index(num_shards: usize, dims: usize) -> DistributedIndex {
        let mut config = ClusterConfig::new(num_shards, dims);
        config.engine.metric = DistanceMetric::L2;
        DistributedIndex::new(Box::new(HashSharding::new(num_shards)), &config).unwrap()
    }

    #[test]
    fn test_single_add_routes_to_one_shard() {
        let idx = index(4, 2);
        idx.add(42, &[1.0, 2.0]).unwrap();
        assert_eq!(idx.size(), 1);
        let populated = idx
            .shard_diagnostics()
            .iter()
            .filter(|d| d.size > 0)
            .count();
        assert_eq!(populated, 1);
    }

    #[test]
    fn test_add_batch_spreads_and_preserves_totals() {
        let idx = index(4, 2);
        let keys: Vec<u64> = (0..100).collect();
        let vectors: Vec<f32> = (0..200).map(|i| i as f32).collect();
        idx.add_batch(&keys, &vectors).unwrap();
        assert_eq!(idx.size(), 100);
    }

    #[test]
    fn test_add_batch_rejects_bad_shape() {
        let idx = index(2, 2);
        assert!(idx.add_batch(&[1, 2], &[0.0, 0.0, 0.0]).is_err());
        assert_eq!(idx.size(), 0);
    }

    #[test]
    fn test_round_robin_balances_batch() {
        let mut config = ClusterConfig::new(4, 1);
        config.engine.metric = DistanceMetric::L2;
        let idx =
            DistributedIndex::new(Box::new(RoundRobinSharding::new(4)), &config).unwrap();

        let keys: Vec<u64> = (0..40).collect();
        let vectors: Vec<f32> = (0..40).map(|i| i as f32).collect();
        idx.add_batch(&keys, &vectors).unwrap();

        for diag in idx.shard_diagnostics() {
            assert_eq!(diag.size, 10);
        }
    }

    #[test]
    fn test_search_merges_across_shards() {
        let mut config = ClusterConfig::new(2, 1);
        config.engine.metric = DistanceMetric::L2;
        let idx = DistributedIndex::new(Box::new(RangeSharding::new(2, 4)), &config).unwrap();

        // keys 0,1 -> shard 0; keys 2,3 -> shard 1
        idx.add_batch(&[0, 1, 2, 3], &[0.0, 10.0, 1.0, 11.0]).unwrap();

        let results = idx.search(&[0.0], 2, 0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, 0);
        assert_eq!(results[1].key, 2);
    }

    #[test]
    fn test_search_fewer_than_k_results() {
        let idx = index(4, 2);
        idx.add(1, &[0.0, 0.0]).unwrap();
        let results = idx.search(&[0.0, 0.0], 10, 0).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_n_probe_limits_shards_consulted() {
        let mut config = ClusterConfig::new(4, 1);
        config.engine.metric = DistanceMetric::L2;
        let idx = DistributedIndex::new(Box::new(RangeSharding::new(4, 8)), &config).unwrap();
        idx.add_batch(
            &[0, 2, 4, 6],
            &[0.0, 2.0, 4.0, 6.0],
        )
        .unwrap();

        // Probing only shard 0 can only see key 0 (range: keys 0..2)
        let results = idx.search(&[0.0], 4, 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, 0);

        // Probing all shards sees everything
        let results = idx.search(&[0.0], 4, 0).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_total_queries_counter() {
        let idx = index(2, 2);
        idx.search(&[0.0, 0.0], 1, 0).unwrap();
        idx.search(&[0.0, 0.0], 1, 0).unwrap();
        assert_eq!(idx.total_queries(), 2);
    }

    #[test]
    fn test_save_all_load_all_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("cluster");

        let idx = index(2, 2);
        let keys: Vec<u64> = (0..10).collect();
        let vectors: Vec<f32> = (0..10).flat_map(|i| [i as f32, 0.0]).collect();
        idx.add_batch(&keys, &vectors).unwrap();
        idx.save_all(&base).unwrap();

        let restored = index(2, 2);
        restored.load_all(&base).unwrap();
        assert_eq!(restored.size(), 10);
    }

    #[test]
    fn test_load_all_fails_fast_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let idx = index(2, 2);
        let err = idx.load_all(&dir.path().join("missing"));
        assert!(err.is_err());
    }

    #[test]
    fn test_erroring_shard_contributes_nothing_to_fan_out() {
        use crate::core::config::EngineConfig;

        let engine = |dims: usize| {
            let config = EngineConfig {
                metric: DistanceMetric::L2,
                ..EngineConfig::new(dims)
            };
            Box::new(FlatIndexEngine::new(&config).unwrap())
        };

        // Shard 1 was built with the wrong dimensionality, so every search
        // against it errors while shards 0 and 2 answer normally.
        let shards = vec![
            Arc::new(ShardNode::new(0, engine(2))),
            Arc::new(ShardNode::new(1, engine(3))),
            Arc::new(ShardNode::new(2, engine(2))),
        ];
        shards[0].add(10, &[0.0, 0.0]).unwrap();
        shards[1].add(20, &[1.0, 1.0, 1.0]).unwrap();
        shards[2].add(30, &[2.0, 0.0]).unwrap();

        let idx = DistributedIndex::from_shards(Box::new(HashSharding::new(3)), shards);

        // The broken shard counts as empty; the healthy shards' hits survive
        let results = idx.search(&[0.0, 0.0], 3, 0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, 10);
        assert_eq!(results[1].key, 30);
    }

    #[test]
    fn test_merge_collapses_duplicates_keeping_minimum_distance() {
        // A key-sorted dedupe could keep a higher-distance duplicate; merge
        // must keep the minimum-distance entry.
        let partials = vec![
            SearchResult { key: 7, distance: 0.9 },
            SearchResult { key: 7, distance: 0.2 },
        ];
        let merged = merge_shard_results(partials, 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].key, 7);
        assert!((merged[0].distance - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_merge_example_from_two_shards() {
        // shard A: [(k1, 1.0), (k2, 0.5)]; shard B: [(k2, 0.5), (k3, 2.0)]
        let partials = vec![
            SearchResult { key: 1, distance: 1.0 },
            SearchResult { key: 2, distance: 0.5 },
            SearchResult { key: 2, distance: 0.5 },
            SearchResult { key: 3, distance: 2.0 },
        ];
        let merged = merge_shard_results(partials, 2);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].key, 2);
        assert!((merged[0].distance - 0.5).abs() < 1e-6);
        assert_eq!(merged[1].key, 1);
        assert!((merged[1].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_merge_no_padding_below_k() {
        let partials = vec![SearchResult { key: 1, distance: 0.1 }];
        assert_eq!(merge_shard_results(partials, 5).len(), 1);
    }
}
