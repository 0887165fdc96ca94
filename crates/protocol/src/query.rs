//! Read-only status records returned by query and queryAll

use serde::{Deserialize, Serialize};

/// Global transaction as stored by the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransGlobal {
    #[serde(default)]
    pub gid: String,
    #[serde(default)]
    pub trans_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub query_prepared: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// One branch of a global transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransBranch {
    #[serde(default)]
    pub gid: String,
    #[serde(default)]
    pub branch_id: String,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: String,
}

/// Reply of `query`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransQuery {
    #[serde(default)]
    pub transaction: Option<TransGlobal>,
    #[serde(default)]
    pub branches: Vec<TransBranch>,
}

/// Filter of `queryAll`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Opaque cursor returned as `next_position` by the previous page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl QueryFilter {
    /// Non-empty fields as query parameters
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = &self.status {
            params.push(("status", status.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(position) = &self.position {
            params.push(("position", position.clone()));
        }
        params
    }
}

/// Reply of `queryAll`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAllResult {
    #[serde(default)]
    pub transactions: Vec<TransGlobal>,
    #[serde(default)]
    pub next_position: String,
}
