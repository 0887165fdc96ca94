//! Transport configuration and construction

use crate::error::{Result, TransportError};
use crate::{HttpTransport, JsonRpcTransport, RpcTransport, Transport};
use dtx_rpc::RpcChannel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Wire protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    #[default]
    Http,
    JsonRpc,
    Rpc,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Http => "http",
            Protocol::JsonRpc => "json-rpc",
            Protocol::Rpc => "rpc",
        })
    }
}

/// Settings needed to build a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub protocol: Protocol,

    /// Coordinator address: base url for HTTP and JSON-RPC, service target for RPC
    pub server: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Http,
            server: "http://127.0.0.1:36789/api/dtmsvr".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    pub fn new(protocol: Protocol, server: impl Into<String>) -> Self {
        Self {
            protocol,
            server: server.into(),
            ..Default::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Build the transport selected by `config`.
///
/// The RPC protocol needs a channel from the host; asking for it without one
/// is a programming error.
pub fn build_transport(
    config: &TransportConfig,
    rpc_channel: Option<Arc<dyn RpcChannel>>,
) -> Result<Arc<dyn Transport>> {
    if config.server.is_empty() {
        return Err(TransportError::ProtocolMisuse(
            "coordinator server address is empty".to_string(),
        ));
    }

    let timeout = config.request_timeout();
    let transport: Arc<dyn Transport> = match config.protocol {
        Protocol::Http => Arc::new(HttpTransport::new(config.server.clone(), timeout)?),
        Protocol::JsonRpc => Arc::new(JsonRpcTransport::new(config.server.clone(), timeout)?),
        Protocol::Rpc => {
            let channel = rpc_channel.ok_or_else(|| {
                TransportError::ProtocolMisuse("rpc protocol requires an rpc channel".to_string())
            })?;
            Arc::new(RpcTransport::new(channel, config.server.clone(), timeout))
        }
    };

    tracing::debug!(
        "built {} transport for coordinator {}",
        config.protocol,
        config.server
    );
    Ok(transport)
}
