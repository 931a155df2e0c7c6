/// Cluster composition root: shards plus the load balancer, failure
/// detector, and span tracer that coordinate them.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::core::config::ClusterConfig;
use crate::core::errors::Result;
use crate::distributed::balancer::{AdaptiveLoadBalancer, ShardStatsSnapshot};
use crate::distributed::failure::FailureDetector;
use crate::distributed::index::merge_shard_results;
use crate::distributed::shard_node::ShardNode;
use crate::engine::{FlatIndexEngine, SearchResult};
use crate::observability::tracer::Tracer;

fn node_address(shard_id: usize) -> String {
    format!("shard-{}", shard_id)
}

fn shard_id_from_address(address: &str) -> Option<usize> {
    address.strip_prefix("shard-").and_then(|s| s.parse().ok())
}

pub struct Cluster {
    shards: Vec<Arc<ShardNode>>,
    balancer: AdaptiveLoadBalancer,
    detector: FailureDetector,
    tracer: Arc<Tracer>,
    unavailable: Arc<Mutex<HashSet<usize>>>,
}

impl Cluster {
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;

        let shards: Vec<Arc<ShardNode>> = (0..config.num_shards)
            .map(|shard_id| {
                FlatIndexEngine::new(&config.engine)
                    .map(|engine| Arc::new(ShardNode::new(shard_id, Box::new(engine))))
            })
            .collect::<Result<_>>()?;

        let detector = FailureDetector::with_intervals(
            config.heartbeat_timeout,
            config.detection_interval,
            config.failure_threshold,
        );
        for shard in &shards {
            detector.add_node(node_address(shard.shard_id()));
        }

        let unavailable = Arc::new(Mutex::new(HashSet::new()));
        let unavailable_in_cb = unavailable.clone();
        detector.set_failure_callback(Box::new(move |address| {
            if let Some(shard_id) = shard_id_from_address(address) {
                warn!(shard_id, "shard marked unavailable");
                unavailable_in_cb.lock().insert(shard_id);
            }
        }));

        info!(
            num_shards = config.num_shards,
            dimensions = config.engine.dimensions,
            "cluster initialized"
        );

        Ok(Cluster {
            shards,
            balancer: AdaptiveLoadBalancer::new(config.num_shards),
            detector,
            tracer: Arc::new(Tracer::new()),
            unavailable,
        })
    }

    /// Top-k search on the single least-loaded shard. Useful when the
    /// workload replicates data or any shard's answer is acceptable.
    pub fn smart_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let span = self.tracer.start_span("smart_search", None);
        let shard_id = self.balancer.select_shard();
        self.tracer.add_tag(span, "shard_id", shard_id.to_string());

        self.balancer.record_request_start(shard_id);
        let started = Instant::now();
        let result = self.shards[shard_id].search(query, k);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.balancer
            .record_request_end(shard_id, latency_ms, result.is_ok());

        self.tracer.finish_span(span);
        result
    }

    /// Fan-out top-k search over the first `min(n_shards, shard count)`
    /// shards, merged into one ascending result list. A shard that errors
    /// contributes nothing; its failure is logged and counted against it in
    /// the balancer.
    pub fn parallel_search(
        &self,
        query: &[f32],
        k: usize,
        n_shards: usize,
    ) -> Result<Vec<SearchResult>> {
        let span = self.tracer.start_span("parallel_search", None);
        let fan_out = n_shards.clamp(1, self.shards.len());
        self.tracer.add_tag(span, "fan_out", fan_out.to_string());

        let all_results: Vec<SearchResult> = self.shards[..fan_out]
            .par_iter()
            .flat_map_iter(|shard| {
                let shard_id = shard.shard_id();
                let child = self.tracer.start_span("shard_search", Some(span));
                self.tracer.add_tag(child, "shard_id", shard_id.to_string());

                self.balancer.record_request_start(shard_id);
                let started = Instant::now();
                let result = shard.search(query, k);
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.balancer
                    .record_request_end(shard_id, latency_ms, result.is_ok());
                self.tracer.finish_span(child);

                match result {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(shard_id, error = %e, "shard search failed during fan-out");
                        Vec::new()
                    }
                }
            })
            .collect();

        self.tracer.finish_span(span);
        Ok(merge_shard_results(all_results, k))
    }

    /// Report shard `shard_id` healthy. Revives it if it was unavailable.
    pub fn heartbeat(&self, shard_id: usize) {
        if shard_id >= self.shards.len() {
            return;
        }
        self.detector.heartbeat(&node_address(shard_id));
        if self.unavailable.lock().remove(&shard_id) {
            info!(shard_id, "shard available again");
        }
    }

    /// Start the background failure-detection loop.
    pub fn start(&self) -> Result<()> {
        self.detector.start()
    }

    pub fn stop(&self) {
        self.detector.stop();
    }

    /// One synchronous detection pass, for deterministic health checks.
    pub fn run_detection_pass(&self) {
        self.detector.run_detection_pass();
    }

    /// Direct handle to one shard, for ingest and diagnostics.
    pub fn shard(&self, shard_id: usize) -> Option<Arc<ShardNode>> {
        self.shards.get(shard_id).cloned()
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Shard ids currently confirmed failed, ascending.
    pub fn unavailable_shards(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.unavailable.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn balancer_stats(&self) -> Vec<ShardStatsSnapshot> {
        self.balancer.stats()
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }
}
