use std::fmt;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 1000-1099: Dimension/Vector errors
    VectorDimensionMismatch = 1001,

    /// 1300-1399: Storage errors
    StorageIOError = 1301,
    CheckpointFailed = 1302,
    RestoreFailed = 1303,

    /// 1400-1499: Engine errors
    EngineRejected = 1401,

    /// 1700-1799: Configuration errors
    InvalidConfiguration = 1701,

    /// 1800-1899: Distributed mode errors
    DistributedModeError = 1801,
    ShardWriteFailed = 1802,

    /// 1900-1999: Background task errors
    TaskAlreadyRunning = 1901,

    /// 9000: Unknown error
    Unknown = 9000,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::VectorDimensionMismatch => "VECTOR_DIMENSION_MISMATCH",
            ErrorCode::StorageIOError => "STORAGE_IO_ERROR",
            ErrorCode::CheckpointFailed => "CHECKPOINT_FAILED",
            ErrorCode::RestoreFailed => "RESTORE_FAILED",
            ErrorCode::EngineRejected => "ENGINE_REJECTED",
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorCode::DistributedModeError => "DISTRIBUTED_MODE_ERROR",
            ErrorCode::ShardWriteFailed => "SHARD_WRITE_FAILED",
            ErrorCode::TaskAlreadyRunning => "TASK_ALREADY_RUNNING",
            ErrorCode::Unknown => "UNKNOWN_ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SwarmError {
    /// Dimension mismatch between a vector and the cluster configuration
    VectorDimensionMismatch { expected: usize, got: usize },
    /// Configuration error (bad dimensions, zero shards, ...)
    ConfigError { message: String },
    /// Storage error with details
    StorageError { code: ErrorCode, message: String },
    /// Underlying engine rejected an operation
    EngineError { message: String },
    /// Distributed operation error (partial batch failure, bad shard id, ...)
    DistributedError { message: String },
    /// Checkpoint creation or restore failure
    CheckpointError { code: ErrorCode, message: String },
    /// Generic error with code
    WithCode { code: ErrorCode, message: String },
}

impl SwarmError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SwarmError::VectorDimensionMismatch { .. } => ErrorCode::VectorDimensionMismatch,
            SwarmError::ConfigError { .. } => ErrorCode::InvalidConfiguration,
            SwarmError::StorageError { code, .. } => *code,
            SwarmError::EngineError { .. } => ErrorCode::EngineRejected,
            SwarmError::DistributedError { .. } => ErrorCode::DistributedModeError,
            SwarmError::CheckpointError { code, .. } => *code,
            SwarmError::WithCode { code, .. } => *code,
        }
    }
}

impl fmt::Display for SwarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmError::VectorDimensionMismatch { expected, got } => {
                write!(
                    f,
                    "[{}] Vector dimension mismatch: expected {}, got {}",
                    self.code().as_str(),
                    expected,
                    got
                )
            }
            SwarmError::ConfigError { message } => {
                write!(f, "[{}] Config error: {}", self.code().as_str(), message)
            }
            SwarmError::StorageError { code, message } => {
                write!(f, "[{}] Storage error: {}", code.as_str(), message)
            }
            SwarmError::EngineError { message } => {
                write!(f, "[{}] Engine error: {}", self.code().as_str(), message)
            }
            SwarmError::DistributedError { message } => {
                write!(f, "[{}] Distributed error: {}", self.code().as_str(), message)
            }
            SwarmError::CheckpointError { code, message } => {
                write!(f, "[{}] Checkpoint error: {}", code.as_str(), message)
            }
            SwarmError::WithCode { code, message } => {
                write!(f, "[{}] {}", code.as_str(), message)
            }
        }
    }
}

impl std::error::Error for SwarmError {}

pub type Result<T> = std::result::Result<T, SwarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = SwarmError::VectorDimensionMismatch {
            expected: 128,
            got: 64,
        };
        assert_eq!(err.code(), ErrorCode::VectorDimensionMismatch);
        assert_eq!(err.code().as_str(), "VECTOR_DIMENSION_MISMATCH");
    }

    #[test]
    fn test_display_carries_code_prefix() {
        let err = SwarmError::ConfigError {
            message: "num_shards must be > 0".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("[INVALID_CONFIGURATION]"));
        assert!(rendered.contains("num_shards"));
    }

    #[test]
    fn test_with_code_passthrough() {
        let err = SwarmError::WithCode {
            code: ErrorCode::CheckpointFailed,
            message: "save failed".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::CheckpointFailed);
    }
}
