//! Error types for context handling

use thiserror::Error;

/// Result type for context operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors raised while building or reading a transaction context
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Missing transaction parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Unknown transaction type: {0}")]
    UnknownTransType(String),

    #[error("Unknown branch operation: {0}")]
    UnknownOp(String),

    #[error("Unknown result: {0}")]
    UnknownOutcome(String),

    #[error("Too many sub branches under branch '{0}'")]
    BranchIdExhausted(String),

    #[error("No transaction context in scope")]
    NoContext,
}
