//! Outbound branch calls

use crate::error::{ClientError, Result};
use dtx_common::{Op, Outcome, TransactionContext};
use dtx_protocol::{BranchRequest, DtmResponse};
use dtx_transport::{BranchReply, Transport};
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;

/// Sends branch calls and turns non-SUCCESS answers into errors
#[derive(Clone)]
pub struct BranchDispatcher {
    transport: Arc<dyn Transport>,
}

impl BranchDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// XA branch: `action` on a new sub branch; phase 2 goes to the same url
    pub async fn call_branch(
        &self,
        ctx: &TransactionContext,
        url: &str,
        payload: Value,
    ) -> Result<BranchReply> {
        let branch_id = ctx.new_sub_branch_id()?;
        self.call_branch_with(ctx, &branch_id, Op::Action, url, url, payload)
            .await
    }

    pub async fn call_branch_with(
        &self,
        ctx: &TransactionContext,
        branch_id: &str,
        op: Op,
        url: &str,
        phase2_url: &str,
        payload: Value,
    ) -> Result<BranchReply> {
        let request = BranchRequest::new(ctx, branch_id, op, url)
            .with_phase2_url(phase2_url)
            .with_payload(payload);
        self.dispatch(&request).await
    }

    /// Send one prepared request
    pub async fn dispatch(&self, request: &BranchRequest) -> Result<BranchReply> {
        let reply = self.transport.dispatch_branch(request).await?;
        if reply.outcome == Outcome::Success {
            return Ok(reply);
        }

        let detail = DtmResponse::from_slice(&reply.body)
            .and_then(|body| body.message)
            .unwrap_or_default();
        let what = format!(
            "branch {} {} of {} at {}: {}",
            request.branch_id, request.op, request.gid, request.url, detail
        );
        match reply.outcome {
            Outcome::Ongoing => Err(ClientError::Ongoing(what)),
            _ => Err(ClientError::Failure(what)),
        }
    }

    /// Send independent calls concurrently.
    ///
    /// The first failure is returned as soon as it arrives; calls still in
    /// flight are dropped. Replies come back in request order.
    pub async fn call_branches(&self, requests: &[BranchRequest]) -> Result<Vec<BranchReply>> {
        try_join_all(requests.iter().map(|request| self.dispatch(request))).await
    }
}
