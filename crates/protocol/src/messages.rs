//! Bodies sent to the coordinator's control endpoints

use dtx_common::{Op, TransType, TransactionContext};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Coordinator-side options attached to prepare/submit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransOptions {
    /// Ask the coordinator to finish phase 2 before answering submit
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wait_result: bool,

    /// Seconds before an unfinished transaction is failed by the coordinator
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout_to_fail: u64,

    /// Seconds between coordinator retries of a branch
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry_interval: u64,

    /// Seconds the coordinator waits on each branch call
    #[serde(default, skip_serializing_if = "is_zero")]
    pub request_timeout: u64,

    /// Inbound headers the coordinator copies onto every branch call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough_headers: Vec<String>,

    /// Fixed headers the coordinator adds to every branch call
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub branch_headers: HashMap<String, String>,
}

/// Body of prepare, submit and abort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransRequest {
    pub gid: String,
    pub trans_type: TransType,

    /// Per-step branch urls keyed by op (SAGA and MSG)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<BTreeMap<String, String>>,

    /// Per-step payload, aligned with `steps`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payloads: Vec<String>,

    /// Url the coordinator calls to ask whether a prepared message committed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query_prepared: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_data: String,

    #[serde(flatten)]
    pub options: TransOptions,
}

impl TransRequest {
    pub fn new(gid: impl Into<String>, trans_type: TransType) -> Self {
        Self {
            gid: gid.into(),
            trans_type,
            steps: Vec::new(),
            payloads: Vec::new(),
            query_prepared: String::new(),
            custom_data: String::new(),
            options: TransOptions::default(),
        }
    }

    pub fn from_context(ctx: &TransactionContext) -> Self {
        Self::new(ctx.gid(), ctx.trans_type())
    }

    pub fn with_options(mut self, options: TransOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a step: its urls keyed by op, and the payload sent to each
    pub fn add_step(&mut self, urls: impl IntoIterator<Item = (Op, String)>, payload: String) {
        let step = urls
            .into_iter()
            .map(|(op, url)| (op.to_string(), url))
            .collect();
        self.steps.push(step);
        self.payloads.push(payload);
    }
}

/// Body of registerBranch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBranchRequest {
    pub gid: String,
    pub trans_type: TransType,
    pub branch_id: String,

    /// Pattern-specific fields: `url` for XA, `confirm`/`cancel`/`data` for TCC
    #[serde(flatten)]
    pub data: BTreeMap<String, String>,
}

impl RegisterBranchRequest {
    /// XA branch: the coordinator calls `phase2_url` with commit or rollback
    pub fn xa(ctx: &TransactionContext, phase2_url: impl Into<String>) -> Self {
        Self {
            gid: ctx.gid().to_string(),
            trans_type: TransType::Xa,
            branch_id: ctx.branch_id().to_string(),
            data: BTreeMap::from([("url".to_string(), phase2_url.into())]),
        }
    }

    /// TCC branch: the coordinator calls `confirm` or `cancel` with `payload`
    pub fn tcc(
        ctx: &TransactionContext,
        branch_id: impl Into<String>,
        confirm_url: impl Into<String>,
        cancel_url: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            gid: ctx.gid().to_string(),
            trans_type: TransType::Tcc,
            branch_id: branch_id.into(),
            data: BTreeMap::from([
                (Op::Confirm.to_string(), confirm_url.into()),
                (Op::Cancel.to_string(), cancel_url.into()),
                ("data".to_string(), payload.into()),
            ]),
        }
    }
}
