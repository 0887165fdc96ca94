//! In-memory request/reply bus

use crate::{Message, Result, RpcChannel, RpcError, RpcStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type Reply = oneshot::Sender<std::result::Result<Message, RpcStatus>>;

/// A call delivered to a registered service
#[derive(Debug)]
pub struct IncomingCall {
    pub method: String,
    pub message: Message,
    reply: Reply,
}

impl IncomingCall {
    /// Answer the call; a caller that gave up is ignored
    pub fn reply(self, result: std::result::Result<Message, RpcStatus>) {
        let _ = self.reply.send(result);
    }
}

/// Services registered by target address
#[derive(Default)]
pub struct MemoryRpc {
    services: Mutex<HashMap<String, mpsc::UnboundedSender<IncomingCall>>>,
}

impl MemoryRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service at `target`, replacing any previous one
    pub fn register(&self, target: &str) -> mpsc::UnboundedReceiver<IncomingCall> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.services.lock().insert(target.to_string(), tx);
        rx
    }

    /// Drop services whose receiver is gone
    pub fn cleanup(&self) {
        self.services.lock().retain(|_, s| !s.is_closed());
    }
}

#[async_trait]
impl RpcChannel for MemoryRpc {
    async fn invoke(
        &self,
        target: &str,
        method: &str,
        request: Message,
        timeout: Duration,
    ) -> Result<Message> {
        let reply_rx = {
            let services = self.services.lock();
            let service = services
                .get(target)
                .ok_or_else(|| RpcError::Unavailable(target.to_string()))?;

            let (reply_tx, reply_rx) = oneshot::channel();
            let call = IncomingCall {
                method: method.to_string(),
                message: request,
                reply: reply_tx,
            };
            if service.send(call).is_err() {
                return Err(RpcError::ChannelClosed);
            }
            reply_rx
        };

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(Ok(reply))) => Ok(reply),
            Ok(Ok(Err(status))) => Err(RpcError::Status(status)),
            Ok(Err(_)) => Err(RpcError::ChannelClosed),
            Err(_) => {
                tracing::debug!("rpc call {} on {} timed out", method, target);
                Err(RpcError::Timeout)
            }
        }
    }
}
