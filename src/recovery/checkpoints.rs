/// Periodic checkpointing for a single shard.
///
/// Each checkpoint is a full binary snapshot of the shard's engine state.
/// Retention is FIFO: once more than `max_checkpoints` exist, the oldest
/// record and its file are removed. Restore always targets the newest
/// checkpoint on record.
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::core::errors::{ErrorCode, Result, SwarmError};
use crate::distributed::shard_node::ShardNode;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Checkpoint {
    pub id: u64,
    pub path: PathBuf,
    /// Unix seconds at creation time
    pub created_at: u64,
    pub num_vectors: usize,
}

struct CheckpointState {
    dir: PathBuf,
    max_checkpoints: usize,
    shard: RwLock<Arc<ShardNode>>,
    checkpoints: Mutex<Vec<Checkpoint>>,
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl CheckpointState {
    /// Snapshot the bound shard to disk and record it. Ids are strictly
    /// increasing starting at 1. A failed save leaves no record behind.
    fn create_checkpoint(&self) -> Result<Checkpoint> {
        let shard = self.shard.read().clone();

        let mut checkpoints = self.checkpoints.lock();
        let id = checkpoints.last().map(|c| c.id + 1).unwrap_or(1);
        let path = self.dir.join(format!("checkpoint_{}.bin", id));

        shard.save(&path).map_err(|e| SwarmError::CheckpointError {
            code: ErrorCode::CheckpointFailed,
            message: format!("checkpoint {} save failed: {}", id, e),
        })?;

        let checkpoint = Checkpoint {
            id,
            path,
            created_at: unix_now_secs(),
            num_vectors: shard.size(),
        };
        info!(
            shard_id = shard.shard_id(),
            checkpoint_id = id,
            num_vectors = checkpoint.num_vectors,
            "checkpoint created"
        );
        checkpoints.push(checkpoint.clone());

        while checkpoints.len() > self.max_checkpoints {
            let evicted = checkpoints.remove(0);
            info!(checkpoint_id = evicted.id, "checkpoint evicted");
            if let Err(e) = fs::remove_file(&evicted.path) {
                warn!(
                    checkpoint_id = evicted.id,
                    error = %e,
                    "failed to remove evicted checkpoint file"
                );
            }
        }

        Ok(checkpoint)
    }

    /// Load the newest checkpoint back into the bound shard. `Ok(false)`
    /// when there is nothing to restore.
    fn restore_latest(&self) -> Result<bool> {
        let shard = self.shard.read().clone();
        let checkpoints = self.checkpoints.lock();

        let latest = match checkpoints.last() {
            Some(c) => c,
            None => return Ok(false),
        };

        shard
            .load(&latest.path)
            .map_err(|e| SwarmError::CheckpointError {
                code: ErrorCode::RestoreFailed,
                message: format!("restore from checkpoint {} failed: {}", latest.id, e),
            })?;
        info!(
            shard_id = shard.shard_id(),
            checkpoint_id = latest.id,
            num_vectors = latest.num_vectors,
            "checkpoint restored"
        );
        Ok(true)
    }
}

pub struct CheckpointManager {
    state: Arc<CheckpointState>,
    interval: Duration,
    is_running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CheckpointManager {
    pub fn new(
        shard: Arc<ShardNode>,
        dir: impl Into<PathBuf>,
        interval: Duration,
        max_checkpoints: usize,
    ) -> Result<Self> {
        if max_checkpoints == 0 {
            return Err(SwarmError::ConfigError {
                message: "max_checkpoints must be >= 1".to_string(),
            });
        }
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SwarmError::StorageError {
            code: ErrorCode::StorageIOError,
            message: format!("checkpoint dir creation failed: {}", e),
        })?;

        Ok(CheckpointManager {
            state: Arc::new(CheckpointState {
                dir,
                max_checkpoints,
                shard: RwLock::new(shard),
                checkpoints: Mutex::new(Vec::new()),
            }),
            interval,
            is_running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        })
    }

    pub fn create_checkpoint(&self) -> Result<Checkpoint> {
        self.state.create_checkpoint()
    }

    pub fn restore_latest(&self) -> Result<bool> {
        self.state.restore_latest()
    }

    /// Point the manager at a different shard. Subsequent checkpoints and
    /// restores target the new shard; existing records are kept.
    pub fn rebind(&self, shard: Arc<ShardNode>) {
        *self.state.shard.write() = shard;
    }

    /// Current retained checkpoints, oldest first.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.state.checkpoints.lock().clone()
    }

    /// Start the periodic checkpoint loop. A failed cycle is logged and the
    /// loop continues.
    pub fn start(&self) -> Result<()> {
        if self.is_running.swap(true, Ordering::AcqRel) {
            return Err(SwarmError::WithCode {
                code: ErrorCode::TaskAlreadyRunning,
                message: "checkpoint manager already running".to_string(),
            });
        }

        let state = self.state.clone();
        let is_running = self.is_running.clone();
        let interval = self.interval;

        let handle = std::thread::spawn(move || {
            while is_running.load(Ordering::Acquire) {
                std::thread::sleep(interval);
                if !is_running.load(Ordering::Acquire) {
                    break;
                }
                if let Err(e) = state.create_checkpoint() {
                    error!(error = %e, "periodic checkpoint failed");
                }
            }
        });
        *self.worker.lock() = Some(handle);
        Ok(())
    }

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

impl Drop for CheckpointManager {
    fn drop(&mut self) {
        self.stop();
    }
}
