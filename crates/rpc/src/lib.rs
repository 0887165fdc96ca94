//! RPC channel abstraction for the RPC-style transport
//!
//! The RPC transport does not know how calls reach a peer; it hands a
//! [`Message`] to an [`RpcChannel`]. A production host plugs in its RPC
//! stack; [`MemoryRpc`] is an in-process request/reply bus used by tests and
//! by services co-located in one process.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod message;

pub use memory::{IncomingCall, MemoryRpc};
pub use message::Message;

/// Status codes a peer may reply with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The call was rejected for a business reason (protocol FAILURE)
    Aborted,
    /// The peer is not ready to decide yet (protocol ONGOING)
    FailedPrecondition,
    InvalidArgument,
    Unavailable,
    Internal,
    Unknown,
}

/// Non-success reply of a peer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct RpcStatus {
    pub code: StatusCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// RPC errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("No service registered at: {0}")]
    Unavailable(String),

    #[error("Call timed out")]
    Timeout,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Peer replied with status {0}")]
    Status(RpcStatus),
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// A way to call a method on a remote service and wait for its reply
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Invoke `method` on the service at `target`
    async fn invoke(
        &self,
        target: &str,
        method: &str,
        request: Message,
        timeout: Duration,
    ) -> Result<Message>;
}
