//! Error types for the barrier

use thiserror::Error;

/// Result type for barrier operations
pub type Result<T> = std::result::Result<T, BarrierError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BarrierError {
    /// The resource store could not be read or written
    #[error("Barrier storage error: {0}")]
    Storage(String),

    #[error("Invalid branch: {0}")]
    InvalidBranch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<fjall::Error> for BarrierError {
    fn from(e: fjall::Error) -> Self {
        BarrierError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for BarrierError {
    fn from(e: serde_json::Error) -> Self {
        BarrierError::Serialization(e.to_string())
    }
}
