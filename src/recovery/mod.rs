pub mod checkpoints;

pub use checkpoints::{Checkpoint, CheckpointManager};
