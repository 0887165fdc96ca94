//! Global transaction skeleton shared by every pattern
//!
//! A global transaction moves `Created -> Prepared -> Submitted | Aborted`.
//! The callback decides the final step: `Ok` submits, any error except
//! ONGOING aborts once. ONGOING leaves the transaction `Prepared` for the
//! coordinator to resolve.

use crate::error::{ClientError, Result, check_outcome};
use dtx_common::TransactionContext;
use dtx_protocol::TransRequest;
use dtx_transport::Transport;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Client-side state of a global transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Created,
    Prepared,
    Submitted,
    Aborted,
}

pub struct GlobalTransaction {
    transport: Arc<dyn Transport>,
    request: TransRequest,
    context: TransactionContext,
    state: Mutex<TransactionState>,
    callback_timeout: Option<Duration>,
}

impl GlobalTransaction {
    pub fn new(
        transport: Arc<dyn Transport>,
        request: TransRequest,
        callback_timeout: Option<Duration>,
    ) -> Self {
        let context = TransactionContext::init(request.gid.clone(), request.trans_type, "")
            .with_dtm(transport.server())
            .with_branch_headers(request.options.branch_headers.clone());
        Self {
            transport,
            request,
            context,
            state: Mutex::new(TransactionState::Created),
            callback_timeout,
        }
    }

    pub fn gid(&self) -> &str {
        &self.request.gid
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    pub fn request(&self) -> &TransRequest {
        &self.request
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn expect_state(&self, allowed: &[TransactionState], action: &str) -> Result<()> {
        let state = *self.state.lock();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(ClientError::InvalidState(format!(
                "Cannot {} transaction {} in state {:?}",
                action, self.request.gid, state
            )))
        }
    }

    /// Register the transaction (and any declared steps) with the coordinator
    pub async fn prepare(&self) -> Result<()> {
        self.expect_state(&[TransactionState::Created], "prepare")?;
        let outcome = self.transport.prepare(&self.request).await?;
        check_outcome(outcome, format!("prepare {}", self.request.gid))?;
        *self.state.lock() = TransactionState::Prepared;
        tracing::debug!("prepared {} transaction {}", self.request.trans_type, self.request.gid);
        Ok(())
    }

    /// Hand the transaction to the coordinator for phase 2 commit.
    ///
    /// Allowed without `prepare` for patterns the coordinator drives entirely.
    pub async fn submit(&self) -> Result<()> {
        self.expect_state(
            &[TransactionState::Created, TransactionState::Prepared],
            "submit",
        )?;
        let outcome = self.transport.submit(&self.request).await?;
        check_outcome(outcome, format!("submit {}", self.request.gid))?;
        *self.state.lock() = TransactionState::Submitted;
        tracing::debug!("submitted transaction {}", self.request.gid);
        Ok(())
    }

    pub async fn abort(&self) -> Result<()> {
        if self.state() == TransactionState::Aborted {
            return Ok(());
        }
        self.expect_state(
            &[TransactionState::Created, TransactionState::Prepared],
            "abort",
        )?;
        let outcome = self.transport.abort(&self.request).await?;
        check_outcome(outcome, format!("abort {}", self.request.gid))?;
        *self.state.lock() = TransactionState::Aborted;
        tracing::debug!("aborted transaction {}", self.request.gid);
        Ok(())
    }

    /// Prepare, run `callback` with the context in scope, then submit or abort
    pub async fn run<F, Fut, T>(&self, callback: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.prepare().await?;

        let result = self.run_callback(callback).await;
        self.finish(result).await
    }

    async fn run_callback<F, Fut, T>(&self, callback: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // The callback itself runs in scope, not just the future it returns
        let scoped = self.context.clone().scope(async move { callback().await });
        match self.callback_timeout {
            Some(limit) => tokio::time::timeout(limit, scoped)
                .await
                .unwrap_or(Err(ClientError::Timeout(limit))),
            None => scoped.await,
        }
    }

    /// Submit after success, abort once after failure, leave ONGOING alone
    pub(crate) async fn finish<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.submit().await?;
                Ok(value)
            }
            Err(e) if e.is_ongoing() => {
                tracing::debug!(
                    "transaction {} left {:?}: {}",
                    self.request.gid,
                    self.state(),
                    e
                );
                Err(e)
            }
            Err(e) => {
                tracing::warn!("aborting transaction {}: {}", self.request.gid, e);
                if let Err(abort_err) = self.abort().await {
                    tracing::error!(
                        "abort of transaction {} failed: {}",
                        self.request.gid,
                        abort_err
                    );
                }
                Err(e)
            }
        }
    }
}
