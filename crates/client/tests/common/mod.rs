//! In-process coordinator and bank participants shared by the scenario tests

#![allow(dead_code)]

use async_trait::async_trait;
use dtx_barrier::{
    BarrierOutcome, BarrierRecord, BarrierStore, BarrierTx, DataTx, MemoryBarrierStore, MemoryTx,
};
use dtx_client::{BranchHandler, ClientError, Participant};
use dtx_common::{Op, Outcome, TransType, TransactionContext};
use dtx_protocol::{
    BranchParams, BranchRequest, DtmResponse, QueryAllResult, QueryFilter, RegisterBranchRequest,
    TransGlobal, TransQuery, TransRequest,
};
use dtx_transport::{BranchReply, Protocol, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub const DTM: &str = "http://dtm/api/dtmsvr";

/// One call seen by the coordinator, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Control {
        op: &'static str,
        gid: String,
    },
    Branch {
        gid: String,
        branch_id: String,
        op: Op,
        url: String,
    },
}

pub fn control(op: &'static str, gid: &str) -> Call {
    Call::Control {
        op,
        gid: gid.to_string(),
    }
}

pub fn branch(gid: &str, branch_id: &str, op: Op, url: &str) -> Call {
    Call::Branch {
        gid: gid.to_string(),
        branch_id: branch_id.to_string(),
        op,
        url: url.to_string(),
    }
}

/// Scripted answer of a control endpoint
#[derive(Debug, Clone)]
pub enum Reply {
    Outcome(Outcome),
    Error(String),
}

/// Something that answers branch calls at a url
#[async_trait]
pub trait Service: Send + Sync {
    async fn handle(
        &self,
        params: BranchParams,
        payload: Value,
    ) -> dtx_client::Result<BarrierOutcome<Value>>;
}

/// Coordinator that records every call and routes branch calls in process.
///
/// Phase 2 is never driven on its own; tests call
/// [`FakeDtm::drive_phase_two`] to deliver commit/rollback/confirm/cancel.
#[derive(Default)]
pub struct FakeDtm {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<HashMap<&'static str, Reply>>,
    bodies: Mutex<Vec<(&'static str, TransRequest)>>,
    registered: Mutex<Vec<RegisterBranchRequest>>,
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
    next_gid: AtomicU32,
}

impl FakeDtm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mount(&self, url: &str, service: Arc<dyn Service>) {
        self.services.lock().insert(url.to_string(), service);
    }

    pub fn reply_with(&self, op: &'static str, reply: Reply) {
        self.replies.lock().insert(op, reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, op: &'static str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Control { op: seen, .. } if *seen == op))
            .count()
    }

    /// Bodies of prepare, submit and abort
    pub fn bodies(&self) -> Vec<(&'static str, TransRequest)> {
        self.bodies.lock().clone()
    }

    pub fn registered(&self) -> Vec<RegisterBranchRequest> {
        self.registered.lock().clone()
    }

    fn control(&self, op: &'static str, gid: &str) -> dtx_transport::Result<Outcome> {
        self.calls.lock().push(control(op, gid));
        match self.replies.lock().get(op).cloned() {
            Some(Reply::Outcome(outcome)) => Ok(outcome),
            Some(Reply::Error(message)) => Err(TransportError::Request(message)),
            None => Ok(Outcome::Success),
        }
    }

    fn record_body(&self, op: &'static str, body: &TransRequest) {
        self.bodies.lock().push((op, body.clone()));
    }

    /// Deliver `op` to every branch registered under `gid`.
    ///
    /// Rollback and cancel go to branches in reverse registration order.
    pub async fn drive_phase_two(&self, gid: &str, op: Op) -> Vec<Outcome> {
        let mut branches: Vec<_> = self
            .registered
            .lock()
            .iter()
            .filter(|branch| branch.gid == gid)
            .cloned()
            .collect();
        if op.is_compensating() {
            branches.reverse();
        }

        let mut outcomes = Vec::new();
        for branch in branches {
            let ctx = TransactionContext::init(gid, branch.trans_type, "").with_dtm(DTM);
            let (url, payload) = match branch.trans_type {
                TransType::Tcc => (
                    branch.data[op.as_str()].clone(),
                    serde_json::from_str(&branch.data["data"]).unwrap(),
                ),
                _ => (branch.data["url"].clone(), Value::Null),
            };
            let request =
                BranchRequest::new(&ctx, branch.branch_id.clone(), op, url).with_payload(payload);
            outcomes.push(self.dispatch_branch(&request).await.unwrap().outcome);
        }
        outcomes
    }

    /// Redeliver a branch call exactly as the coordinator would retry it
    pub async fn redeliver(
        &self,
        gid: &str,
        trans_type: TransType,
        branch_id: &str,
        op: Op,
        url: &str,
        payload: Value,
    ) -> dtx_transport::Result<BranchReply> {
        let ctx = TransactionContext::init(gid, trans_type, "").with_dtm(DTM);
        let request = BranchRequest::new(&ctx, branch_id, op, url).with_payload(payload);
        self.dispatch_branch(&request).await
    }
}

#[async_trait]
impl Transport for FakeDtm {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    fn server(&self) -> &str {
        DTM
    }

    async fn generate_gid(&self) -> dtx_transport::Result<String> {
        let n = self.next_gid.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("gid-{}", n))
    }

    async fn prepare(&self, body: &TransRequest) -> dtx_transport::Result<Outcome> {
        self.record_body("prepare", body);
        self.control("prepare", &body.gid)
    }

    async fn submit(&self, body: &TransRequest) -> dtx_transport::Result<Outcome> {
        self.record_body("submit", body);
        self.control("submit", &body.gid)
    }

    async fn abort(&self, body: &TransRequest) -> dtx_transport::Result<Outcome> {
        self.record_body("abort", body);
        self.control("abort", &body.gid)
    }

    async fn register_branch(
        &self,
        body: &RegisterBranchRequest,
    ) -> dtx_transport::Result<Outcome> {
        let outcome = self.control("registerBranch", &body.gid)?;
        let mut registered = self.registered.lock();
        if outcome.is_success() && !registered.contains(body) {
            registered.push(body.clone());
        }
        Ok(outcome)
    }

    async fn query(&self, gid: &str) -> dtx_transport::Result<TransQuery> {
        let status = self
            .calls
            .lock()
            .iter()
            .rev()
            .find_map(|call| match call {
                Call::Control { op, gid: seen } if seen == gid && *op != "registerBranch" => {
                    Some(*op)
                }
                _ => None,
            })
            .map(|op| match op {
                "prepare" => "prepared",
                "submit" => "submitted",
                _ => "aborting",
            });

        Ok(TransQuery {
            transaction: status.map(|status| TransGlobal {
                gid: gid.to_string(),
                status: status.to_string(),
                ..Default::default()
            }),
            branches: Vec::new(),
        })
    }

    async fn query_all(&self, filter: &QueryFilter) -> dtx_transport::Result<QueryAllResult> {
        let limit = filter.limit.unwrap_or(100) as usize;
        let mut gids: Vec<String> = Vec::new();
        for call in self.calls.lock().iter() {
            if let Call::Control { gid, .. } = call {
                if !gids.contains(gid) {
                    gids.push(gid.clone());
                }
            }
        }
        Ok(QueryAllResult {
            transactions: gids
                .into_iter()
                .take(limit)
                .map(|gid| TransGlobal {
                    gid,
                    ..Default::default()
                })
                .collect(),
            next_position: String::new(),
        })
    }

    async fn dispatch_branch(&self, request: &BranchRequest) -> dtx_transport::Result<BranchReply> {
        self.calls.lock().push(branch(
            &request.gid,
            &request.branch_id,
            request.op,
            &request.url,
        ));

        let service = self.services.lock().get(&request.url).cloned();
        let Some(service) = service else {
            return Err(TransportError::Request(format!(
                "{} returned 404",
                request.url
            )));
        };

        let params = BranchParams::from_query(
            request
                .query_params()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        );

        match service.handle(params, request.payload.clone()).await {
            Ok(outcome) => {
                let body = json!({
                    "dtm_result": "SUCCESS",
                    "result": outcome.applied().unwrap_or(Value::Null),
                });
                Ok(BranchReply {
                    outcome: Outcome::Success,
                    body: serde_json::to_vec(&body)?,
                })
            }
            Err(e) => match e.reply_outcome() {
                Some(outcome) => {
                    let body = DtmResponse {
                        message: Some(e.to_string()),
                        ..DtmResponse::with_result(outcome)
                    };
                    Ok(BranchReply {
                        outcome,
                        body: serde_json::to_vec(&body)?,
                    })
                }
                None => Err(TransportError::Request(e.to_string())),
            },
        }
    }
}

/// Moves `amount` into (or, when negative, out of) the account
#[derive(Default)]
pub struct Transfer {
    runs: AtomicU32,
}

fn amount(payload: &Value) -> dtx_client::Result<i64> {
    payload["amount"]
        .as_i64()
        .ok_or_else(|| ClientError::Business("missing amount".to_string()))
}

fn memo_key(ctx: &TransactionContext) -> String {
    format!("xa:{}:{}", ctx.gid(), ctx.branch_id())
}

fn balance(tx: &MemoryTx) -> dtx_client::Result<i64> {
    let raw = tx.read("balance")?.unwrap_or_else(|| b"0".to_vec());
    Ok(String::from_utf8_lossy(&raw).parse().unwrap_or(0))
}

#[async_trait]
impl BranchHandler<MemoryTx> for Transfer {
    async fn phase_one(
        &self,
        tx: &mut MemoryTx,
        ctx: &TransactionContext,
        payload: &Value,
    ) -> dtx_client::Result<Value> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let next = balance(tx)? + amount(payload)?;
        if next < 0 {
            return Err(ClientError::Business("insufficient balance".to_string()));
        }
        tx.write("balance", next.to_string().into_bytes());
        if ctx.trans_type() == TransType::Xa {
            tx.write(&memo_key(ctx), amount(payload)?.to_string().into_bytes());
        }
        Ok(json!({ "balance": next }))
    }

    async fn phase_two(
        &self,
        tx: &mut MemoryTx,
        ctx: &TransactionContext,
        payload: &Value,
    ) -> dtx_client::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if ctx.op().is_some_and(|op| op.is_compensating()) {
            // XA rollback carries no payload
            let amount = match amount(payload) {
                Ok(amount) => amount,
                Err(_) => {
                    let raw = tx.read(&memo_key(ctx))?.unwrap_or_else(|| b"0".to_vec());
                    String::from_utf8_lossy(&raw).parse().unwrap_or(0)
                }
            };
            let next = balance(tx)? - amount;
            tx.write("balance", next.to_string().into_bytes());
        }
        Ok(())
    }
}

/// Account service: one barrier store, one balance
pub struct Bank {
    participant: Participant<MemoryBarrierStore>,
    store: Arc<MemoryBarrierStore>,
    handler: Arc<Transfer>,
}

impl Bank {
    pub async fn open(dtm: Arc<FakeDtm>, initial: i64) -> Arc<Self> {
        let store = Arc::new(MemoryBarrierStore::new());
        let mut tx = store.begin().await.unwrap();
        tx.write("balance", initial.to_string().into_bytes());
        tx.commit().await.unwrap();

        Arc::new(Self {
            participant: Participant::new(dtm, store.clone()),
            store,
            handler: Arc::new(Transfer::default()),
        })
    }

    pub async fn balance(&self) -> i64 {
        let raw = self.store.value("balance").await.unwrap_or_default();
        String::from_utf8_lossy(&raw).parse().unwrap_or(0)
    }

    /// How many times business code ran, phase one and phase 2 together
    pub fn runs(&self) -> u32 {
        self.handler.runs.load(Ordering::SeqCst)
    }

    pub async fn records(&self, gid: &str) -> Vec<BarrierRecord> {
        self.store.records(gid).await
    }

    pub fn participant(&self) -> &Participant<MemoryBarrierStore> {
        &self.participant
    }
}

#[async_trait]
impl Service for Bank {
    async fn handle(
        &self,
        params: BranchParams,
        payload: Value,
    ) -> dtx_client::Result<BarrierOutcome<Value>> {
        self.participant
            .local_transaction(&params, payload, self.handler.clone())
            .await
    }
}

/// Service with a fixed answer, after an optional delay
pub struct Scripted {
    outcome: Outcome,
    delay: Duration,
}

impl Scripted {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Self::delayed(outcome, Duration::ZERO)
    }

    pub fn delayed(outcome: Outcome, delay: Duration) -> Arc<Self> {
        Arc::new(Self { outcome, delay })
    }
}

#[async_trait]
impl Service for Scripted {
    async fn handle(
        &self,
        _params: BranchParams,
        _payload: Value,
    ) -> dtx_client::Result<BarrierOutcome<Value>> {
        tokio::time::sleep(self.delay).await;
        match self.outcome {
            Outcome::Success => Ok(BarrierOutcome::Applied(json!({}))),
            Outcome::Failure => Err(ClientError::Failure("scripted failure".to_string())),
            Outcome::Ongoing => Err(ClientError::Ongoing("scripted ongoing".to_string())),
        }
    }
}
