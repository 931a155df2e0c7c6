/// Sharding strategies: write routing and read routing.
///
/// `shard_id` decides which shard owns a key at write time. `target_shards`
/// decides which shards a read visits for a given probe count. Hash and
/// range variants approximate read routing with "first n_probe shards in
/// ascending index order" rather than true similarity-based routing; that is
/// a documented limitation of this layer, not a bug.
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::VectorKey;

pub trait ShardingStrategy: Send + Sync {
    /// Which shard owns this key for writes.
    fn shard_id(&self, key: VectorKey) -> usize;

    /// Which shards a read should visit. Always non-empty, deduplicated,
    /// and bounded by the shard count.
    fn target_shards(&self, query: &[f32], n_probe: usize) -> Vec<usize>;

    fn name(&self) -> &'static str;
}

/// FNV-1a over the key bytes
fn fnv1a(key: VectorKey) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.to_le_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn first_n_shards(num_shards: usize, n_probe: usize) -> Vec<usize> {
    (0..n_probe.clamp(1, num_shards)).collect()
}

/// Hash-based sharding: deterministic, coordination-free distribution.
#[derive(Debug)]
pub struct HashSharding {
    num_shards: usize,
}

impl HashSharding {
    pub fn new(num_shards: usize) -> Self {
        assert!(num_shards > 0, "num_shards must be > 0");
        HashSharding { num_shards }
    }
}

impl ShardingStrategy for HashSharding {
    fn shard_id(&self, key: VectorKey) -> usize {
        (fnv1a(key) % self.num_shards as u64) as usize
    }

    fn target_shards(&self, _query: &[f32], n_probe: usize) -> Vec<usize> {
        first_n_shards(self.num_shards, n_probe)
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}

/// Round-robin sharding for write balancing.
///
/// Deliberately impure: each routed write advances a shared counter, so two
/// writes of the same key may land on different shards. The counter is
/// atomic and safe to share across concurrent writers.
#[derive(Debug)]
pub struct RoundRobinSharding {
    num_shards: usize,
    counter: AtomicUsize,
}

impl RoundRobinSharding {
    pub fn new(num_shards: usize) -> Self {
        assert!(num_shards > 0, "num_shards must be > 0");
        RoundRobinSharding {
            num_shards,
            counter: AtomicUsize::new(0),
        }
    }
}

impl ShardingStrategy for RoundRobinSharding {
    fn shard_id(&self, _key: VectorKey) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed) % self.num_shards
    }

    fn target_shards(&self, _query: &[f32], n_probe: usize) -> Vec<usize> {
        first_n_shards(self.num_shards, n_probe)
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}

/// One contiguous, half-open key interval owned by a shard.
#[derive(Debug, Clone)]
struct KeyRange {
    min_key: VectorKey,
    max_key: VectorKey,
    shard_id: usize,
}

/// Range sharding: the key space `[0, total_keys)` is split into N
/// contiguous intervals of approximately equal size; the last interval
/// absorbs the remainder. Keys outside every interval are assigned to the
/// last shard — a deterministic fallback, not an error.
#[derive(Debug)]
pub struct RangeSharding {
    ranges: Vec<KeyRange>,
}

impl RangeSharding {
    pub fn new(num_shards: usize, total_keys: u64) -> Self {
        assert!(num_shards > 0, "num_shards must be > 0");
        let keys_per_shard = total_keys / num_shards as u64;

        let ranges = (0..num_shards)
            .map(|i| {
                let min_key = i as u64 * keys_per_shard;
                let max_key = if i == num_shards - 1 {
                    total_keys
                } else {
                    (i as u64 + 1) * keys_per_shard
                };
                KeyRange {
                    min_key,
                    max_key,
                    shard_id: i,
                }
            })
            .collect();

        RangeSharding { ranges }
    }
}

impl ShardingStrategy for RangeSharding {
    fn shard_id(&self, key: VectorKey) -> usize {
        for range in &self.ranges {
            if key >= range.min_key && key < range.max_key {
                return range.shard_id;
            }
        }
        self.ranges[self.ranges.len() - 1].shard_id
    }

    fn target_shards(&self, _query: &[f32], n_probe: usize) -> Vec<usize> {
        first_n_shards(self.ranges.len(), n_probe)
    }

    fn name(&self) -> &'static str {
        "range"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_sharding_deterministic() {
        let sharding = HashSharding::new(8);
        for key in [0u64, 1, 42, u64::MAX] {
            let first = sharding.shard_id(key);
            let second = sharding.shard_id(key);
            assert_eq!(first, second);
            assert!(first < 8);
        }
    }

    #[test]
    fn test_hash_sharding_spreads_keys() {
        let sharding = HashSharding::new(8);
        let hit: HashSet<usize> = (0..1000u64).map(|k| sharding.shard_id(k)).collect();
        assert!(hit.len() > 4, "1000 keys should reach most of 8 shards");
    }

    #[test]
    fn test_round_robin_cycles() {
        let sharding = RoundRobinSharding::new(3);
        let assigned: Vec<usize> = (0..6u64).map(|k| sharding.shard_id(k)).collect();
        assert_eq!(assigned, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_range_covers_key_space_without_gaps() {
        let num_shards = 4;
        let total_keys = 103; // deliberately not divisible
        let sharding = RangeSharding::new(num_shards, total_keys);

        let mut per_shard = vec![0usize; num_shards];
        for key in 0..total_keys {
            let shard = sharding.shard_id(key);
            assert!(shard < num_shards);
            per_shard[shard] += 1;
        }
        // Every key maps to exactly one shard and all keys are covered
        assert_eq!(per_shard.iter().sum::<usize>(), total_keys as usize);
        // First shards get total/num each, the last absorbs the remainder
        assert_eq!(per_shard[0], 25);
        assert_eq!(per_shard[3], 28);
    }

    #[test]
    fn test_range_out_of_bounds_falls_to_last_shard() {
        let sharding = RangeSharding::new(4, 100);
        assert_eq!(sharding.shard_id(100), 3);
        assert_eq!(sharding.shard_id(u64::MAX), 3);
    }

    #[test]
    fn test_range_deterministic() {
        let sharding = RangeSharding::new(4, 100);
        assert_eq!(sharding.shard_id(10), sharding.shard_id(10));
    }

    #[test]
    fn test_target_shards_bounded_and_nonempty() {
        let strategies: Vec<Box<dyn ShardingStrategy>> = vec![
            Box::new(HashSharding::new(4)),
            Box::new(RoundRobinSharding::new(4)),
            Box::new(RangeSharding::new(4, 100)),
        ];
        let query = [0.0f32; 2];
        for strategy in &strategies {
            assert_eq!(strategy.target_shards(&query, 2), vec![0, 1]);
            // 0 means "at least one shard"; oversized probe counts clamp
            assert_eq!(strategy.target_shards(&query, 0), vec![0]);
            assert_eq!(strategy.target_shards(&query, 99), vec![0, 1, 2, 3]);
        }
    }
}
