//! Inbound branch calls
//!
//! A participant rebuilds the caller's context from the call parameters and
//! runs the matching handler method behind the resource barrier: phase-one
//! operations (`try`, `action`) through [`BranchHandler::phase_one`], phase-2
//! operations through [`BranchHandler::phase_two`].

use crate::error::{ClientError, Result, check_outcome};
use async_trait::async_trait;
use dtx_barrier::{BarrierOutcome, BarrierStore, BranchBarrier, ResourceBarrier, SkipReason};
use dtx_common::{Outcome, TransactionContext};
use dtx_protocol::{BranchParams, RegisterBranchRequest};
use dtx_transport::Transport;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

/// Business logic of one branch.
///
/// Both methods run inside the barrier's store transaction `tx`; their
/// writes commit together with the barrier rows, or not at all.
#[async_trait]
pub trait BranchHandler<Tx: Send>: Send + Sync {
    /// Forward operation: XA `action`, TCC `try`, SAGA and MSG `action`
    async fn phase_one(
        &self,
        tx: &mut Tx,
        ctx: &TransactionContext,
        payload: &Value,
    ) -> Result<Value>;

    /// Phase-2 operation; `ctx.op()` tells which one
    async fn phase_two(
        &self,
        tx: &mut Tx,
        ctx: &TransactionContext,
        payload: &Value,
    ) -> Result<()>;
}

/// Serves inbound branch calls against one resource store
pub struct Participant<S> {
    transport: Arc<dyn Transport>,
    barrier: ResourceBarrier<S>,
}

impl<S> Clone for Participant<S> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            barrier: self.barrier.clone(),
        }
    }
}

impl<S: BarrierStore> Participant<S> {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<S>) -> Self {
        Self {
            transport,
            barrier: ResourceBarrier::new(store),
        }
    }

    pub fn barrier(&self) -> &ResourceBarrier<S> {
        &self.barrier
    }

    /// Handle one inbound branch call.
    ///
    /// Replays and out-of-order deliveries come back as `Skipped` and should
    /// be answered with SUCCESS. An XA branch registers its phase-2 url with
    /// the coordinator after phase one, unless the branch was already rolled
    /// back.
    pub async fn local_transaction<H>(
        &self,
        params: &BranchParams,
        payload: Value,
        handler: Arc<H>,
    ) -> Result<BarrierOutcome<Value>>
    where
        H: BranchHandler<S::Tx> + 'static,
    {
        let ctx = params.context()?;
        let op = ctx
            .op()
            .ok_or_else(|| ClientError::ProtocolMisuse("branch call without op".to_string()))?;
        let mut branch = BranchBarrier::from_context(&ctx)?;

        if op.is_phase_two() {
            let scoped = ctx.clone();
            let outcome = self
                .barrier
                .execute(&mut branch, move |tx| {
                    async move {
                        handler.phase_two(tx, &scoped, &payload).await?;
                        Ok::<_, ClientError>(Value::Null)
                    }
                    .boxed()
                })
                .await?;
            return Ok(outcome);
        }

        let scoped = ctx.clone();
        let outcome = self
            .barrier
            .execute(&mut branch, move |tx| {
                async move { handler.phase_one(tx, &scoped, &payload).await }.boxed()
            })
            .await?;

        if ctx.trans_type().registers_on_participant()
            && outcome.skip_reason() != Some(SkipReason::Suspended)
        {
            let phase2_url = params.phase2_url().ok_or_else(|| {
                ClientError::ProtocolMisuse(format!(
                    "{} branch {} called without a phase-2 url",
                    ctx.trans_type(),
                    ctx.branch_id()
                ))
            })?;
            let request = RegisterBranchRequest::xa(&ctx, phase2_url);
            let registered = self.transport.register_branch(&request).await?;
            check_outcome(
                registered,
                format!("register branch {} of {}", ctx.branch_id(), ctx.gid()),
            )?;
        }
        Ok(outcome)
    }

    /// Answer the coordinator's query about a prepared message
    pub async fn query_prepared(&self, gid: &str) -> Result<Outcome> {
        Ok(self.barrier.query_prepared(gid).await?)
    }
}
