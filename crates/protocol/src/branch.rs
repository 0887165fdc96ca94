//! Outbound and inbound form of branch calls
//!
//! A branch call carries the transaction context next to the business
//! payload: as query parameters on request/response transports, or as
//! `dtm-` prefixed call metadata on RPC transports.

use dtx_common::constants::{
    METADATA_PREFIX, PARAM_BRANCH_ID, PARAM_DTM, PARAM_GID, PARAM_OP, PARAM_PHASE2_URL,
    PARAM_TRANS_TYPE,
};
use dtx_common::{ContextError, Op, TransType, TransactionContext};
use std::collections::HashMap;

/// One outbound call to a branch
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRequest {
    pub dtm: String,
    pub gid: String,
    pub trans_type: TransType,
    pub branch_id: String,
    pub op: Op,
    /// Address of the branch endpoint
    pub url: String,
    /// Address the coordinator calls later for phase 2
    pub phase2_url: String,
    pub payload: serde_json::Value,
    /// Extra headers (HTTP) or metadata (RPC) for the branch
    pub branch_headers: HashMap<String, String>,
}

impl BranchRequest {
    /// Build a call for `branch_id` carrying the identifiers of `ctx`
    pub fn new(
        ctx: &TransactionContext,
        branch_id: impl Into<String>,
        op: Op,
        url: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            dtm: ctx.dtm().to_string(),
            gid: ctx.gid().to_string(),
            trans_type: ctx.trans_type(),
            branch_id: branch_id.into(),
            op,
            phase2_url: url.clone(),
            url,
            payload: serde_json::Value::Null,
            branch_headers: ctx.branch_headers().clone(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_phase2_url(mut self, phase2_url: impl Into<String>) -> Self {
        self.phase2_url = phase2_url.into();
        self
    }

    /// Same branch, different operation (e.g. compensating a saga step)
    pub fn for_op(&self, op: Op, url: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.op = op;
        next.url = url.into();
        next
    }

    /// Context as query parameters
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (PARAM_DTM, self.dtm.clone()),
            (PARAM_GID, self.gid.clone()),
            (PARAM_BRANCH_ID, self.branch_id.clone()),
            (PARAM_TRANS_TYPE, self.trans_type.to_string()),
            (PARAM_OP, self.op.to_string()),
        ];
        if !self.phase2_url.is_empty() {
            params.push((PARAM_PHASE2_URL, self.phase2_url.clone()));
        }
        params
    }

    /// Context as RPC call metadata, merged over the branch headers
    pub fn metadata(&self) -> HashMap<String, String> {
        let mut metadata = self.branch_headers.clone();
        for (key, value) in self.query_params() {
            metadata.insert(format!("{METADATA_PREFIX}{key}"), value);
        }
        metadata.insert(format!("{METADATA_PREFIX}url"), self.url.clone());
        metadata
    }
}

/// Parameters of an inbound branch call, normalized across transports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchParams {
    params: HashMap<String, String>,
}

impl BranchParams {
    /// From the query string of a request/response call
    pub fn from_query(query: HashMap<String, String>) -> Self {
        Self { params: query }
    }

    /// From RPC call metadata; keys without the `dtm-` prefix are ignored
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        let params = metadata
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(METADATA_PREFIX)
                    .map(|key| (key.to_string(), value.clone()))
            })
            .collect();
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn phase2_url(&self) -> Option<&str> {
        self.get(PARAM_PHASE2_URL).filter(|url| !url.is_empty())
    }

    /// Rebuild the caller's transaction context
    pub fn context(&self) -> Result<TransactionContext, ContextError> {
        TransactionContext::from_params(&self.params)
    }
}

impl From<HashMap<String, String>> for BranchParams {
    fn from(query: HashMap<String, String>) -> Self {
        Self::from_query(query)
    }
}
