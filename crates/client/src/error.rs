//! Error types for the transaction engine

use dtx_barrier::BarrierError;
use dtx_common::{ContextError, Outcome};
use dtx_transport::TransportError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transaction engine errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Barrier error: {0}")]
    Barrier(#[from] BarrierError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// The remote side answered FAILURE
    #[error("Failure: {0}")]
    Failure(String),

    /// The remote side answered ONGOING; the outcome is not decided yet
    #[error("Ongoing: {0}")]
    Ongoing(String),

    #[error("Callback timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    #[error("Protocol misuse: {0}")]
    ProtocolMisuse(String),

    /// Raised by business code; aborts the transaction like a FAILURE
    #[error("Business error: {0}")]
    Business(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for transaction engine operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn is_ongoing(&self) -> bool {
        matches!(self, ClientError::Ongoing(_))
    }

    /// Protocol answer a participant should reply with for this error.
    ///
    /// `None` means the error is not a protocol answer and must surface as a
    /// transport-level failure (e.g. HTTP 500), so the coordinator retries.
    pub fn reply_outcome(&self) -> Option<Outcome> {
        match self {
            ClientError::Failure(_) | ClientError::Business(_) => Some(Outcome::Failure),
            ClientError::Ongoing(_) => Some(Outcome::Ongoing),
            _ => None,
        }
    }
}

/// Turn a remote outcome into `Ok` or the matching error
pub(crate) fn check_outcome(outcome: Outcome, what: impl fmt::Display) -> Result<()> {
    match outcome {
        Outcome::Success => Ok(()),
        Outcome::Failure => Err(ClientError::Failure(what.to_string())),
        Outcome::Ongoing => Err(ClientError::Ongoing(what.to_string())),
    }
}
