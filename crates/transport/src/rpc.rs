//! RPC-style transport
//!
//! The transaction context travels as `dtm-` prefixed call metadata; bodies
//! are JSON. A reply's result is read from its `dtm-result` metadata, or
//! from the status code when the peer rejected the call.

use crate::error::{Result, TransportError};
use crate::{BranchReply, Protocol, Transport, ops};
use async_trait::async_trait;
use dtx_common::Outcome;
use dtx_common::constants::METADATA_RESULT;
use dtx_protocol::{
    BranchRequest, DtmResponse, QueryAllResult, QueryFilter, RegisterBranchRequest, TransQuery,
    TransRequest,
};
use dtx_rpc::{Message, RpcChannel, RpcError, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Transport over a host-provided [`RpcChannel`]
pub struct RpcTransport {
    channel: Arc<dyn RpcChannel>,
    server: String,
    timeout: Duration,
}

impl RpcTransport {
    pub fn new(channel: Arc<dyn RpcChannel>, server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            channel,
            server: server.into(),
            timeout,
        }
    }

    async fn invoke<B: Serialize + Sync>(
        &self,
        target: &str,
        method: &str,
        body: &B,
        metadata: std::collections::HashMap<String, String>,
    ) -> Result<(Outcome, Vec<u8>)> {
        let request = Message::new(serde_json::to_vec(body)?, metadata);
        let result = self
            .channel
            .invoke(target, method, request, self.timeout)
            .await;
        classify_reply(method, result)
    }

    async fn call_dtm<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<Outcome> {
        let (outcome, _) = self
            .invoke(&self.server, method, body, Default::default())
            .await?;
        tracing::debug!("coordinator {} answered {}", method, outcome);
        Ok(outcome)
    }

    async fn call_query<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T> {
        let (outcome, reply) = self
            .invoke(&self.server, method, body, Default::default())
            .await?;
        if !outcome.is_success() {
            return Err(TransportError::Request(format!(
                "{} answered {}",
                method, outcome
            )));
        }
        serde_json::from_slice(&reply)
            .map_err(|e| TransportError::Decode(format!("{} reply: {}", method, e)))
    }
}

/// Map a channel result onto an outcome or a transport failure
fn classify_reply(
    method: &str,
    result: dtx_rpc::Result<Message>,
) -> Result<(Outcome, Vec<u8>)> {
    match result {
        Ok(reply) => {
            let outcome = match reply.get_metadata(METADATA_RESULT) {
                Some(value) => value.parse::<Outcome>().map_err(|_| {
                    TransportError::Decode(format!("{} replied result '{}'", method, value))
                })?,
                None => Outcome::Success,
            };
            Ok((outcome, reply.body))
        }
        Err(RpcError::Status(status)) => match status.code {
            StatusCode::Aborted => Ok((Outcome::Failure, status.message.into_bytes())),
            StatusCode::FailedPrecondition => Ok((Outcome::Ongoing, status.message.into_bytes())),
            _ => Err(TransportError::Request(format!("{} failed: {}", method, status))),
        },
        Err(e) => Err(e.into()),
    }
}

/// Split `host:port/package.Service/Method` into target and method
fn split_branch_url(url: &str) -> Result<(&str, &str)> {
    match url.split_once('/') {
        Some((target, method)) if !target.is_empty() && !method.is_empty() => Ok((target, method)),
        _ => Err(TransportError::ProtocolMisuse(format!(
            "rpc branch url '{}' must be 'target/method'",
            url
        ))),
    }
}

#[async_trait]
impl Transport for RpcTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Rpc
    }

    fn server(&self) -> &str {
        &self.server
    }

    async fn generate_gid(&self) -> Result<String> {
        let (outcome, reply) = self
            .invoke(&self.server, ops::NEW_GID, &serde_json::json!({}), Default::default())
            .await?;
        let body = DtmResponse::from_slice(&reply).unwrap_or_default();
        match body.gid {
            Some(gid) if outcome.is_success() && !gid.is_empty() => Ok(gid),
            _ => Err(TransportError::GenerationFailed(
                body.message.unwrap_or_default(),
            )),
        }
    }

    async fn prepare(&self, body: &TransRequest) -> Result<Outcome> {
        self.call_dtm(ops::PREPARE, body).await
    }

    async fn submit(&self, body: &TransRequest) -> Result<Outcome> {
        self.call_dtm(ops::SUBMIT, body).await
    }

    async fn abort(&self, body: &TransRequest) -> Result<Outcome> {
        self.call_dtm(ops::ABORT, body).await
    }

    async fn register_branch(&self, body: &RegisterBranchRequest) -> Result<Outcome> {
        self.call_dtm(ops::REGISTER_BRANCH, body).await
    }

    async fn query(&self, gid: &str) -> Result<TransQuery> {
        self.call_query(ops::QUERY, &serde_json::json!({ "gid": gid }))
            .await
    }

    async fn query_all(&self, filter: &QueryFilter) -> Result<QueryAllResult> {
        self.call_query(ops::QUERY_ALL, filter).await
    }

    async fn dispatch_branch(&self, request: &BranchRequest) -> Result<BranchReply> {
        if !(request.payload.is_object() || request.payload.is_null()) {
            return Err(TransportError::ProtocolMisuse(
                "rpc branch payload must be a message object".to_string(),
            ));
        }
        let (target, method) = split_branch_url(&request.url)?;

        let (outcome, body) = self
            .invoke(target, method, &request.payload, request.metadata())
            .await?;
        tracing::debug!(
            "branch {} {} of {} answered {}",
            request.branch_id,
            request.op,
            request.gid,
            outcome
        );
        Ok(BranchReply { outcome, body })
    }
}
