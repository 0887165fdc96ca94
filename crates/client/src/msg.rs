//! Two-phase message pattern
//!
//! A message lists branch actions the coordinator will deliver once the
//! sender's local transaction has committed. The sender prepares the
//! message with a query url, commits locally, then submits. If the sender
//! disappears in between, the coordinator asks the query url, and the
//! barrier answers from the sender's own store.

use crate::error::{ClientError, Result};
use crate::global::{GlobalTransaction, TransactionState};
use dtx_barrier::{
    BarrierOutcome, BarrierStore, BoxFuture, BranchBarrier, ResourceBarrier, SkipReason,
};
use dtx_common::constants::MSG_BRANCH_ID;
use dtx_common::{Op, Outcome, TransType};
use dtx_protocol::{TransOptions, TransRequest};
use dtx_transport::Transport;
use serde_json::Value;
use std::sync::Arc;

pub struct Msg {
    transport: Arc<dyn Transport>,
    request: TransRequest,
    global: Option<GlobalTransaction>,
}

impl Msg {
    pub(crate) fn new(transport: Arc<dyn Transport>, gid: String, options: TransOptions) -> Self {
        Self {
            transport,
            request: TransRequest::new(gid, TransType::Msg).with_options(options),
            global: None,
        }
    }

    pub fn gid(&self) -> &str {
        &self.request.gid
    }

    pub fn state(&self) -> TransactionState {
        self.global
            .as_ref()
            .map_or(TransactionState::Created, GlobalTransaction::state)
    }

    /// Append a branch action
    pub fn add(mut self, action: impl Into<String>, payload: Value) -> Result<Self> {
        self.request.add_step(
            [(Op::Action, action.into())],
            serde_json::to_string(&payload)?,
        );
        Ok(self)
    }

    fn global(&mut self) -> &GlobalTransaction {
        self.global.get_or_insert_with(|| {
            GlobalTransaction::new(self.transport.clone(), self.request.clone(), None)
        })
    }

    /// Announce the message; the coordinator may call `query_prepared` from now on
    pub async fn prepare(&mut self, query_prepared: &str) -> Result<()> {
        if self.global.is_none() {
            self.request.query_prepared = query_prepared.to_string();
        }
        self.global().prepare().await
    }

    /// Release the message for delivery
    pub async fn submit(&mut self) -> Result<()> {
        self.global().submit().await
    }

    /// Prepare, run the local transaction behind the barrier, then submit.
    ///
    /// The local transaction runs under the message's barrier row, so a
    /// concurrent `query_prepared` sees either the committed row or writes a
    /// rollback row that keeps a late local transaction from running. A
    /// business failure aborts the message. Any other error is settled by
    /// asking the barrier, exactly as the coordinator would.
    pub async fn do_and_submit<S, F>(
        &mut self,
        query_prepared: &str,
        barrier: &ResourceBarrier<S>,
        effect: F,
    ) -> Result<()>
    where
        S: BarrierStore,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<()>> + Send,
    {
        let gid = self.gid().to_string();
        let mut branch = BranchBarrier::new(TransType::Msg, gid.clone(), MSG_BRANCH_ID, Op::Msg)?;
        self.prepare(query_prepared).await?;

        let decision = match barrier.execute(&mut branch, effect).await {
            Ok(BarrierOutcome::Applied(())) => Ok(()),
            // Committed by an earlier attempt
            Ok(BarrierOutcome::Skipped(SkipReason::Duplicate)) => Ok(()),
            Ok(BarrierOutcome::Skipped(reason)) => Err(ClientError::Failure(format!(
                "local transaction of message {} not run: {:?}",
                gid, reason
            ))),
            Err(e) if e.reply_outcome() == Some(Outcome::Failure) => Err(e),
            Err(e) => {
                tracing::warn!("local transaction of message {} failed: {}", gid, e);
                match barrier.query_prepared(&gid).await? {
                    Outcome::Success => Ok(()),
                    _ => Err(e),
                }
            }
        };

        self.global().finish(decision).await
    }
}
