//! Error types for the transport

use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport errors.
///
/// None of these is a protocol answer: FAILURE and ONGOING replies are
/// returned as an [`Outcome`](dtx_common::Outcome), never as an error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection error, or a status that carries no protocol result
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Gid generation failed: {0}")]
    GenerationFailed(String),

    /// Unsupported transport variant or payload the protocol cannot carry
    #[error("Protocol misuse: {0}")]
    ProtocolMisuse(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

impl From<dtx_rpc::RpcError> for TransportError {
    fn from(e: dtx_rpc::RpcError) -> Self {
        match e {
            dtx_rpc::RpcError::Timeout => TransportError::Timeout("rpc call".to_string()),
            other => TransportError::Request(other.to_string()),
        }
    }
}
