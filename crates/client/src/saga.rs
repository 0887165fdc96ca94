//! SAGA pattern
//!
//! A saga is an ordered list of steps, each an `action` with its
//! `compensate`. [`Saga::submit`] hands the whole list to the coordinator.
//! [`Saga::execute`] drives the actions from this process and compensates
//! the completed ones in reverse order when one fails.

use crate::dispatcher::BranchDispatcher;
use crate::error::{ClientError, Result};
use crate::global::GlobalTransaction;
use dtx_common::{Op, TransType};
use dtx_protocol::{BranchRequest, TransOptions, TransRequest};
use dtx_transport::Transport;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One saga step
#[derive(Debug, Clone, PartialEq)]
pub struct SagaStep {
    pub action: String,
    pub compensate: String,
    pub payload: Value,
}

/// Saga builder
pub struct Saga {
    transport: Arc<dyn Transport>,
    gid: String,
    options: TransOptions,
    callback_timeout: Option<Duration>,
    steps: Vec<SagaStep>,
}

impl Saga {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        gid: String,
        options: TransOptions,
        callback_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            gid,
            options,
            callback_timeout,
            steps: Vec::new(),
        }
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub fn with_options(mut self, options: TransOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a step
    pub fn add(
        mut self,
        action: impl Into<String>,
        compensate: impl Into<String>,
        payload: Value,
    ) -> Self {
        self.steps.push(SagaStep {
            action: action.into(),
            compensate: compensate.into(),
            payload,
        });
        self
    }

    fn global(&self) -> Result<GlobalTransaction> {
        let mut request =
            TransRequest::new(self.gid.clone(), TransType::Saga).with_options(self.options.clone());
        for step in &self.steps {
            request.add_step(
                [
                    (Op::Action, step.action.clone()),
                    (Op::Compensate, step.compensate.clone()),
                ],
                serde_json::to_string(&step.payload)?,
            );
        }
        Ok(GlobalTransaction::new(
            self.transport.clone(),
            request,
            self.callback_timeout,
        ))
    }

    /// Let the coordinator run every step
    pub async fn submit(self) -> Result<()> {
        self.global()?.submit().await
    }

    /// Run the actions from this process, one after another.
    ///
    /// On a failed action the steps already done are compensated last to
    /// first, then the saga is aborted and the failure returned. A step whose
    /// outcome is unknown (transport error) is compensated too; the barrier
    /// on its side makes that safe. ONGOING stops the saga without
    /// compensation or abort.
    pub async fn execute(self) -> Result<()> {
        let global = self.global()?;
        let dispatcher = BranchDispatcher::new(self.transport.clone());
        let steps = &self.steps;
        global
            .run(|| Self::run_steps(&global, &dispatcher, steps))
            .await
    }

    async fn run_steps(
        global: &GlobalTransaction,
        dispatcher: &BranchDispatcher,
        steps: &[SagaStep],
    ) -> Result<()> {
        let ctx = global.context();
        let mut attempted: Vec<(BranchRequest, &SagaStep)> = Vec::with_capacity(steps.len());

        for step in steps {
            let branch_id = ctx.new_sub_branch_id()?;
            let request = BranchRequest::new(ctx, branch_id, Op::Action, step.action.clone())
                .with_phase2_url(step.compensate.clone())
                .with_payload(step.payload.clone());

            match dispatcher.dispatch(&request).await {
                Ok(_) => attempted.push((request, step)),
                Err(e) if e.is_ongoing() => return Err(e),
                Err(e) => {
                    if !matches!(e, ClientError::Failure(_)) {
                        attempted.push((request, step));
                    }
                    Self::compensate(dispatcher, &attempted).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn compensate(dispatcher: &BranchDispatcher, attempted: &[(BranchRequest, &SagaStep)]) {
        for (request, step) in attempted.iter().rev() {
            let compensation = request.for_op(Op::Compensate, step.compensate.clone());
            if let Err(e) = dispatcher.dispatch(&compensation).await {
                // The coordinator compensates again after abort
                tracing::warn!(
                    "compensation of branch {} in {} failed: {}",
                    request.branch_id,
                    request.gid,
                    e
                );
            }
        }
    }
}
