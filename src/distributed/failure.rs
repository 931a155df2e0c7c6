/// Heartbeat-based failure detection.
///
/// A single detector instance observes every registered node. This is a
/// liveness heuristic, not a consensus failure detector: no quorum, no
/// gossip. A node is confirmed failed only after `failure_threshold`
/// consecutive detection passes found its heartbeat stale, which suppresses
/// false positives from transient delays.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::core::errors::{ErrorCode, Result, SwarmError};

pub type FailureCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Tracked state for one registered node. Created on registration, mutated
/// on every heartbeat and detection pass, never deleted.
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub address: String,
    pub last_heartbeat: Instant,
    pub is_alive: bool,
    pub failure_count: usize,
}

struct DetectorState {
    nodes: Mutex<HashMap<String, NodeStatus>>,
    on_failure: RwLock<Option<FailureCallback>>,
    heartbeat_timeout: Duration,
    failure_threshold: usize,
}

impl DetectorState {
    /// One detection pass over every registered node. A stale node is
    /// marked dead and its failure count incremented; the confirmed-failure
    /// callback fires exactly when the count reaches the threshold, so at
    /// most once per failure episode. Callbacks run after the node table
    /// lock is released.
    fn detect_once(&self) {
        let now = Instant::now();
        let mut confirmed: Vec<String> = Vec::new();

        {
            let mut nodes = self.nodes.lock();
            for status in nodes.values_mut() {
                if now.duration_since(status.last_heartbeat) <= self.heartbeat_timeout {
                    continue;
                }
                status.is_alive = false;
                status.failure_count += 1;
                warn!(
                    address = %status.address,
                    failure_count = status.failure_count,
                    "node missed heartbeat deadline"
                );
                if status.failure_count == self.failure_threshold {
                    info!(address = %status.address, "node confirmed failed");
                    confirmed.push(status.address.clone());
                }
            }
        }

        if !confirmed.is_empty() {
            let callback = self.on_failure.read();
            if let Some(cb) = callback.as_ref() {
                for address in &confirmed {
                    cb(address);
                }
            }
        }
    }
}

pub struct FailureDetector {
    state: Arc<DetectorState>,
    detection_interval: Duration,
    is_running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FailureDetector {
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self::with_intervals(heartbeat_timeout, Duration::from_secs(1), 3)
    }

    pub fn with_intervals(
        heartbeat_timeout: Duration,
        detection_interval: Duration,
        failure_threshold: usize,
    ) -> Self {
        FailureDetector {
            state: Arc::new(DetectorState {
                nodes: Mutex::new(HashMap::new()),
                on_failure: RwLock::new(None),
                heartbeat_timeout,
                failure_threshold,
            }),
            detection_interval,
            is_running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Register a node as alive with a fresh heartbeat. Re-adding an
    /// existing node resets its state.
    pub fn add_node(&self, address: impl Into<String>) {
        let address = address.into();
        self.state.nodes.lock().insert(
            address.clone(),
            NodeStatus {
                address,
                last_heartbeat: Instant::now(),
                is_alive: true,
                failure_count: 0,
            },
        );
    }

    /// Record a heartbeat: any state goes back to alive and the failure
    /// count resets. Unregistered addresses are ignored.
    pub fn heartbeat(&self, address: &str) {
        if let Some(status) = self.state.nodes.lock().get_mut(address) {
            status.last_heartbeat = Instant::now();
            status.is_alive = true;
            status.failure_count = 0;
        }
    }

    /// Register the confirmed-failure observer. At most one; a later call
    /// replaces the previous callback.
    pub fn set_failure_callback(&self, callback: FailureCallback) {
        *self.state.on_failure.write() = Some(callback);
    }

    /// Snapshot of one node's tracked state.
    pub fn node_status(&self, address: &str) -> Option<NodeStatus> {
        self.state.nodes.lock().get(address).cloned()
    }

    pub fn is_alive(&self, address: &str) -> bool {
        self.state
            .nodes
            .lock()
            .get(address)
            .map(|s| s.is_alive)
            .unwrap_or(false)
    }

    /// Run one detection pass synchronously. The background loop calls this
    /// on its tick; tests can call it directly for deterministic timing.
    pub fn run_detection_pass(&self) {
        self.state.detect_once();
    }

    /// Start the background detection loop.
    pub fn start(&self) -> Result<()> {
        if self.is_running.swap(true, Ordering::AcqRel) {
            return Err(SwarmError::WithCode {
                code: ErrorCode::TaskAlreadyRunning,
                message: "failure detector already running".to_string(),
            });
        }

        let state = self.state.clone();
        let is_running = self.is_running.clone();
        let interval = self.detection_interval;

        let handle = std::thread::spawn(move || {
            while is_running.load(Ordering::Acquire) {
                std::thread::sleep(interval);
                if !is_running.load(Ordering::Acquire) {
                    break;
                }
                state.detect_once();
            }
        });
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Stop the loop and join it. After this returns no further callbacks
    /// fire.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            handle.join().ok();
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

impl Drop for FailureDetector {
    fn drop(&mut self) {
        self.stop();
    }
}
