//! Call-scoped transaction context
//!
//! A `TransactionContext` carries the identifiers of one global or branch
//! transaction through every call in and out of the process. It is created
//! when a global transaction starts, or rebuilt from the parameters of an
//! inbound branch call, and dropped when that call returns.
//!
//! The context can be passed explicitly, and it can also be installed in
//! task-local storage with [`TransactionContext::scope`] so that nested code
//! reaches it through [`TransactionContext::current`]. Two tasks never see
//! each other's context.

use crate::branch_id::BranchIdGenerator;
use crate::constants::{PARAM_BRANCH_ID, PARAM_DTM, PARAM_GID, PARAM_OP, PARAM_TRANS_TYPE};
use crate::error::{ContextError, Result};
use crate::op::Op;
use crate::trans_type::TransType;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT: TransactionContext;
}

/// Identifiers of the transaction the current call belongs to
#[derive(Debug, Clone)]
pub struct TransactionContext {
    gid: String,
    trans_type: TransType,
    branch_id: String,
    op: Option<Op>,
    dtm: String,
    branch_headers: HashMap<String, String>,
    /// Shared by clones of this context, so sibling calls never reuse an id
    branch_ids: Arc<BranchIdGenerator>,
}

impl TransactionContext {
    /// Start a context for `gid`; sub branches are issued under `branch_id`
    pub fn init(gid: impl Into<String>, trans_type: TransType, branch_id: impl Into<String>) -> Self {
        let branch_id = branch_id.into();
        Self {
            gid: gid.into(),
            trans_type,
            branch_ids: Arc::new(BranchIdGenerator::new(branch_id.clone())),
            branch_id,
            op: None,
            dtm: String::new(),
            branch_headers: HashMap::new(),
        }
    }

    /// Rebuild a context from the flat parameters of an inbound call
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &'static str| {
            params
                .get(key)
                .filter(|v| !v.is_empty())
                .ok_or(ContextError::MissingParameter(key))
        };

        let gid = required(PARAM_GID)?;
        let trans_type = required(PARAM_TRANS_TYPE)?.parse::<TransType>()?;
        let branch_id = required(PARAM_BRANCH_ID)?;
        let op = required(PARAM_OP)?.parse::<Op>()?;

        let mut ctx = Self::init(gid.clone(), trans_type, branch_id.clone()).with_op(op);
        if let Some(dtm) = params.get(PARAM_DTM) {
            ctx.dtm = dtm.clone();
        }
        Ok(ctx)
    }

    pub fn with_op(mut self, op: Op) -> Self {
        self.op = Some(op);
        self
    }

    pub fn with_dtm(mut self, dtm: impl Into<String>) -> Self {
        self.dtm = dtm.into();
        self
    }

    pub fn with_branch_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.branch_headers = headers;
        self
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn trans_type(&self) -> TransType {
        self.trans_type
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn op(&self) -> Option<Op> {
        self.op
    }

    pub fn dtm(&self) -> &str {
        &self.dtm
    }

    pub fn branch_headers(&self) -> &HashMap<String, String> {
        &self.branch_headers
    }

    pub fn set_op(&mut self, op: Op) {
        self.op = Some(op);
    }

    pub fn set_dtm(&mut self, dtm: impl Into<String>) {
        self.dtm = dtm.into();
    }

    /// Move to another branch; sub-branch numbering restarts under it
    pub fn set_branch_id(&mut self, branch_id: impl Into<String>) {
        self.branch_id = branch_id.into();
        self.branch_ids = Arc::new(BranchIdGenerator::new(self.branch_id.clone()));
    }

    pub fn set_branch_headers(&mut self, headers: HashMap<String, String>) {
        self.branch_headers = headers;
    }

    /// Issue a new branch id under the current branch
    pub fn new_sub_branch_id(&self) -> Result<String> {
        self.branch_ids.next_id()
    }

    /// Flat key/value form embedded in outbound calls
    pub fn serialize(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert(PARAM_DTM.to_string(), self.dtm.clone());
        out.insert(PARAM_GID.to_string(), self.gid.clone());
        out.insert(PARAM_BRANCH_ID.to_string(), self.branch_id.clone());
        out.insert(PARAM_TRANS_TYPE.to_string(), self.trans_type.to_string());
        if let Some(op) = self.op {
            out.insert(PARAM_OP.to_string(), op.to_string());
        }
        out
    }

    /// Run `fut` with this context installed for the current task
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, fut).await
    }

    /// Context installed by the innermost enclosing [`scope`](Self::scope)
    pub fn current() -> Result<Self> {
        CURRENT
            .try_with(Clone::clone)
            .map_err(|_| ContextError::NoContext)
    }

    pub fn try_current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }
}
