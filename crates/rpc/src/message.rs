//! Message type carried by RPC channels

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Call or reply: a serialized body plus metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message body (serialized data)
    pub body: Vec<u8>,

    /// Call metadata
    pub metadata: HashMap<String, String>,
}

impl Message {
    /// Create a new message with body and metadata
    pub fn new(body: Vec<u8>, metadata: HashMap<String, String>) -> Self {
        Self { body, metadata }
    }

    /// Create a message with just body
    pub fn with_body(body: Vec<u8>) -> Self {
        Self {
            body,
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata entry to the message
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Get metadata value
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }
}

impl From<Vec<u8>> for Message {
    fn from(body: Vec<u8>) -> Self {
        Message::with_body(body)
    }
}
