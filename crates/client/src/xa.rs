//! XA pattern
//!
//! Each branch performs its local work on `action` and registers a phase-2
//! url. The coordinator then sends one decision to every branch: `commit`
//! after submit, `rollback` after abort.

use crate::dispatcher::BranchDispatcher;
use crate::error::Result;
use crate::global::GlobalTransaction;
use dtx_common::{Op, TransactionContext};
use dtx_protocol::BranchRequest;
use dtx_transport::BranchReply;
use serde_json::Value;
use std::sync::Arc;

/// Handle given to an XA callback
#[derive(Clone)]
pub struct XaTransaction {
    global: Arc<GlobalTransaction>,
    dispatcher: BranchDispatcher,
}

impl XaTransaction {
    pub(crate) fn new(global: Arc<GlobalTransaction>, dispatcher: BranchDispatcher) -> Self {
        Self { global, dispatcher }
    }

    pub fn gid(&self) -> &str {
        self.global.gid()
    }

    pub fn context(&self) -> &TransactionContext {
        self.global.context()
    }

    /// Call one branch's `action`
    pub async fn call_branch(&self, url: &str, payload: Value) -> Result<BranchReply> {
        self.dispatcher
            .call_branch(self.global.context(), url, payload)
            .await
    }

    /// Call several branches at once; the first failure wins
    pub async fn call_branches(&self, calls: Vec<(String, Value)>) -> Result<Vec<BranchReply>> {
        let ctx = self.global.context();
        let mut requests = Vec::with_capacity(calls.len());
        for (url, payload) in calls {
            let branch_id = ctx.new_sub_branch_id()?;
            requests.push(
                BranchRequest::new(ctx, branch_id, Op::Action, url)
                    .with_payload(payload),
            );
        }
        self.dispatcher.call_branches(&requests).await
    }
}
