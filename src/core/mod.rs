pub mod config;
pub mod errors;

pub use config::{ClusterConfig, EngineConfig};
pub use errors::{ErrorCode, Result, SwarmError};
