//! TCC pattern
//!
//! The caller registers a confirm/cancel pair with the coordinator, then
//! calls `try` directly. Submit makes the coordinator confirm every branch,
//! abort makes it cancel them.

use crate::dispatcher::BranchDispatcher;
use crate::error::{Result, check_outcome};
use crate::global::GlobalTransaction;
use dtx_common::{Op, TransactionContext};
use dtx_protocol::RegisterBranchRequest;
use dtx_transport::BranchReply;
use serde_json::Value;
use std::sync::Arc;

/// Handle given to a TCC callback
#[derive(Clone)]
pub struct TccTransaction {
    global: Arc<GlobalTransaction>,
    dispatcher: BranchDispatcher,
}

impl TccTransaction {
    pub(crate) fn new(global: Arc<GlobalTransaction>, dispatcher: BranchDispatcher) -> Self {
        Self { global, dispatcher }
    }

    pub fn gid(&self) -> &str {
        self.global.gid()
    }

    pub fn context(&self) -> &TransactionContext {
        self.global.context()
    }

    /// Register a branch's confirm and cancel urls, then call its `try`
    pub async fn call_branch(
        &self,
        payload: Value,
        try_url: &str,
        confirm_url: &str,
        cancel_url: &str,
    ) -> Result<BranchReply> {
        let ctx = self.global.context();
        let branch_id = ctx.new_sub_branch_id()?;

        let register = RegisterBranchRequest::tcc(
            ctx,
            branch_id.clone(),
            confirm_url,
            cancel_url,
            serde_json::to_string(&payload)?,
        );
        let registered = self.global.transport().register_branch(&register).await?;
        check_outcome(
            registered,
            format!("register branch {} of {}", branch_id, ctx.gid()),
        )?;

        self.dispatcher
            .call_branch_with(ctx, &branch_id, Op::Try, try_url, "", payload)
            .await
    }
}
