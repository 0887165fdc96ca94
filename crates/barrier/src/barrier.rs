//! Guarded execution of branch effects
//!
//! Before a branch effect runs, the barrier records the operation in the
//! resource's own transaction. The records make the effect idempotent, turn
//! a compensation that arrives before its forward operation into a no-op,
//! and stop a forward operation that arrives after its compensation.

use crate::error::{BarrierError, Result};
use crate::record::{BarrierKey, BarrierRecord};
use crate::store::{BarrierStore, BarrierTx};
use dtx_common::constants::{MSG_BARRIER_ID, MSG_BRANCH_ID};
use dtx_common::{Op, Outcome, TransType, TransactionContext};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Why an effect was not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The same operation already ran
    Duplicate,
    /// Compensation with no forward operation to undo
    NullCompensation,
    /// Forward operation arriving after its compensation
    Suspended,
}

/// Result of a guarded execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierOutcome<T> {
    Applied(T),
    Skipped(SkipReason),
}

impl<T> BarrierOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, BarrierOutcome::Applied(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            BarrierOutcome::Applied(_) => None,
            BarrierOutcome::Skipped(reason) => Some(*reason),
        }
    }

    pub fn applied(self) -> Option<T> {
        match self {
            BarrierOutcome::Applied(value) => Some(value),
            BarrierOutcome::Skipped(_) => None,
        }
    }
}

/// Identifiers of the branch operation being guarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchBarrier {
    trans_type: TransType,
    gid: String,
    branch_id: String,
    op: Op,
    barrier_count: u32,
}

impl BranchBarrier {
    pub fn new(
        trans_type: TransType,
        gid: impl Into<String>,
        branch_id: impl Into<String>,
        op: Op,
    ) -> Result<Self> {
        let gid = gid.into();
        let branch_id = branch_id.into();
        if gid.is_empty() {
            return Err(BarrierError::InvalidBranch("empty gid".to_string()));
        }
        if branch_id.is_empty() {
            return Err(BarrierError::InvalidBranch(format!(
                "empty branch id in {}",
                gid
            )));
        }
        Ok(Self {
            trans_type,
            gid,
            branch_id,
            op,
            barrier_count: 0,
        })
    }

    /// Barrier for the operation an inbound call is performing
    pub fn from_context(ctx: &TransactionContext) -> Result<Self> {
        let op = ctx.op().ok_or_else(|| {
            BarrierError::InvalidBranch(format!("no operation for branch {}", ctx.branch_id()))
        })?;
        Self::new(ctx.trans_type(), ctx.gid(), ctx.branch_id(), op)
    }

    pub fn trans_type(&self) -> TransType {
        self.trans_type
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn op(&self) -> Op {
        self.op
    }

    /// Sub-operation id: "01" for the first guarded call in this branch, then "02", ...
    fn next_barrier_id(&mut self) -> String {
        self.barrier_count += 1;
        format!("{:02}", self.barrier_count)
    }
}

/// Runs effects against a resource store behind barrier records
pub struct ResourceBarrier<S> {
    store: Arc<S>,
}

impl<S> Clone for ResourceBarrier<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: BarrierStore> ResourceBarrier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `effect` at most once for this branch operation.
    ///
    /// The barrier rows and the effect's writes share one store transaction.
    /// If the effect fails, everything is rolled back, guard rows included,
    /// and the effect's error is returned.
    pub async fn execute<F, T, E>(
        &self,
        branch: &mut BranchBarrier,
        effect: F,
    ) -> std::result::Result<BarrierOutcome<T>, E>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, std::result::Result<T, E>> + Send,
        T: Send,
        E: From<BarrierError> + Send,
    {
        let barrier_id = branch.next_barrier_id();
        let key = BarrierKey::new(
            branch.trans_type,
            branch.gid.clone(),
            branch.branch_id.clone(),
            branch.op,
            barrier_id,
        );

        let mut tx = self.store.begin().await?;

        let origin_inserted = match branch.op.origin() {
            Some(origin) => {
                let placeholder = BarrierRecord::new(key.with_op(origin), branch.op);
                tx.insert_if_absent(&placeholder).await?
            }
            None => false,
        };
        let current_inserted = tx
            .insert_if_absent(&BarrierRecord::new(key.clone(), branch.op))
            .await?;

        let skip = if branch.op.is_compensating() && origin_inserted {
            Some(SkipReason::NullCompensation)
        } else if !current_inserted {
            match tx.get(&key).await? {
                Some(existing) if existing.reason != branch.op => Some(SkipReason::Suspended),
                _ => Some(SkipReason::Duplicate),
            }
        } else {
            None
        };

        if let Some(reason) = skip {
            tx.commit().await?;
            tracing::debug!(
                "skipped {} of branch {} in {}: {:?}",
                branch.op,
                branch.branch_id,
                branch.gid,
                reason
            );
            return Ok(BarrierOutcome::Skipped(reason));
        }

        match effect(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!(
                    "applied {} of branch {} in {}",
                    branch.op,
                    branch.branch_id,
                    branch.gid
                );
                Ok(BarrierOutcome::Applied(value))
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        "rollback of {} for branch {} failed: {}",
                        branch.op,
                        branch.branch_id,
                        rollback_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Decide a prepared message whose local transaction state is unknown.
    ///
    /// Writes a rollback placeholder for the message's local transaction. If
    /// the placeholder is new, or an earlier query already wrote it, the
    /// local transaction never committed and never will: the answer is
    /// FAILURE. If the local transaction's own row is there, it is SUCCESS.
    pub async fn query_prepared(&self, gid: &str) -> Result<Outcome> {
        let key = BarrierKey::new(TransType::Msg, gid, MSG_BRANCH_ID, Op::Msg, MSG_BARRIER_ID);
        let mut tx = self.store.begin().await?;

        let reason = if tx
            .insert_if_absent(&BarrierRecord::new(key.clone(), Op::Rollback))
            .await?
        {
            Op::Rollback
        } else {
            tx.get(&key)
                .await?
                .map(|record| record.reason)
                .unwrap_or(Op::Rollback)
        };
        tx.commit().await?;

        let outcome = if reason == Op::Rollback {
            Outcome::Failure
        } else {
            Outcome::Success
        };
        tracing::debug!("query prepared for {} answered {}", gid, outcome);
        Ok(outcome)
    }
}
