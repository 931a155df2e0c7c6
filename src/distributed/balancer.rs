/// Adaptive load balancing across shards.
///
/// Keeps live per-shard statistics and picks the least-loaded shard using a
/// weighted-least-connections score. Every counter is a per-shard atomic so
/// bookkeeping for unrelated shards never serializes.
use std::sync::atomic::{AtomicU64, Ordering};

/// EMA decay: new = 0.9 * old + 0.1 * sample
const EMA_DECAY: f64 = 0.9;
/// Latency contribution to the selection score is avg_latency_ms / 10
const LATENCY_WEIGHT: f64 = 10.0;

/// Live statistics for one shard. Mutated concurrently by every in-flight
/// request touching that shard.
#[derive(Debug)]
struct ShardStats {
    shard_id: usize,
    active_requests: AtomicU64,
    total_requests: AtomicU64,
    /// f64 bit pattern; updated with a compare-exchange loop
    avg_latency_bits: AtomicU64,
    error_count: AtomicU64,
}

impl ShardStats {
    fn new(shard_id: usize) -> Self {
        ShardStats {
            shard_id,
            active_requests: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            avg_latency_bits: AtomicU64::new(0.0f64.to_bits()),
            error_count: AtomicU64::new(0),
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        f64::from_bits(self.avg_latency_bits.load(Ordering::Acquire))
    }

    fn update_latency_ema(&self, latency_ms: f64) {
        let mut current = self.avg_latency_bits.load(Ordering::Acquire);
        loop {
            let old = f64::from_bits(current);
            let new = old * EMA_DECAY + latency_ms * (1.0 - EMA_DECAY);
            match self.avg_latency_bits.compare_exchange_weak(
                current,
                new.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Read-only snapshot of one shard's statistics.
#[derive(Debug, Clone)]
pub struct ShardStatsSnapshot {
    pub shard_id: usize,
    pub active_requests: u64,
    pub total_requests: u64,
    pub avg_latency_ms: f64,
    pub error_count: u64,
}

pub struct AdaptiveLoadBalancer {
    shards: Vec<ShardStats>,
}

impl AdaptiveLoadBalancer {
    pub fn new(num_shards: usize) -> Self {
        AdaptiveLoadBalancer {
            shards: (0..num_shards).map(ShardStats::new).collect(),
        }
    }

    /// Weighted-least-connections selection:
    /// `score = active_requests + avg_latency_ms / 10`. Returns the shard
    /// with the minimum score; the ascending scan breaks ties toward the
    /// lowest shard index.
    pub fn select_shard(&self) -> usize {
        let mut best_shard = 0;
        let mut best_score = f64::MAX;

        for shard in &self.shards {
            let active = shard.active_requests.load(Ordering::Acquire) as f64;
            let score = active + shard.avg_latency_ms() / LATENCY_WEIGHT;
            if score < best_score {
                best_score = score;
                best_shard = shard.shard_id;
            }
        }
        best_shard
    }

    /// Call before dispatching a request to `shard_id`.
    pub fn record_request_start(&self, shard_id: usize) {
        let stats = &self.shards[shard_id];
        stats.active_requests.fetch_add(1, Ordering::AcqRel);
        stats.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Call after the request completes, successfully or not.
    pub fn record_request_end(&self, shard_id: usize, latency_ms: f64, success: bool) {
        let stats = &self.shards[shard_id];
        stats.active_requests.fetch_sub(1, Ordering::AcqRel);
        stats.update_latency_ema(latency_ms);
        if !success {
            stats.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn stats(&self) -> Vec<ShardStatsSnapshot> {
        self.shards
            .iter()
            .map(|s| ShardStatsSnapshot {
                shard_id: s.shard_id,
                active_requests: s.active_requests.load(Ordering::Acquire),
                total_requests: s.total_requests.load(Ordering::Relaxed),
                avg_latency_ms: s.avg_latency_ms(),
                error_count: s.error_count.load(Ordering::Relaxed),
            })
            .collect()
    }
}
