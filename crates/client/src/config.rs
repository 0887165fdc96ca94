//! Client configuration

use dtx_protocol::TransOptions;
use dtx_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by every global transaction a client starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub transport: TransportConfig,

    /// Coordinator options sent with every prepare and submit
    pub options: TransOptions,

    /// Caller-side limit on a transaction callback in milliseconds, 0 for none
    pub callback_timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: TransOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        (self.callback_timeout_ms > 0).then(|| Duration::from_millis(self.callback_timeout_ms))
    }
}
