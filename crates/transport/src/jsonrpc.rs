//! JSON-RPC 2.0 over HTTP
//!
//! Control calls go to one endpoint as JSON-RPC envelopes whose method is
//! the control operation. Branch calls are plain HTTP requests, exactly as
//! with [`HttpTransport`](crate::HttpTransport).

use crate::error::{Result, TransportError};
use crate::http::dispatch_http;
use crate::{BranchReply, Protocol, Transport, ops};
use async_trait::async_trait;
use dtx_common::Outcome;
use dtx_protocol::{
    BranchRequest, DtmResponse, JsonRpcRequest, JsonRpcResponse, QueryAllResult, QueryFilter,
    RegisterBranchRequest, TransQuery, TransRequest, classify_json_rpc,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// JSON-RPC transport; `server` is the coordinator's JSON-RPC endpoint
pub struct JsonRpcTransport {
    client: reqwest::Client,
    server: String,
}

impl JsonRpcTransport {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("HTTP client error: {}", e)))?;
        Ok(Self::with_client(client, server))
    }

    pub fn with_client(client: reqwest::Client, server: impl Into<String>) -> Self {
        Self {
            client,
            server: server.into(),
        }
    }

    /// Send one envelope and return the decoded reply envelope
    async fn call<P: Serialize + Sync>(&self, method: &str, params: &P) -> Result<JsonRpcResponse> {
        let request = JsonRpcRequest::new(
            method,
            serde_json::to_value(params)?,
            uuid::Uuid::new_v4().to_string(),
        );

        let response = self.client.post(&self.server).json(&request).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        serde_json::from_slice::<JsonRpcResponse>(&bytes).map_err(|_| {
            TransportError::Request(format!(
                "{} returned {}: {}",
                method,
                status,
                String::from_utf8_lossy(&bytes)
            ))
        })
    }

    async fn call_dtm<P: Serialize + Sync>(&self, method: &str, params: &P) -> Result<Outcome> {
        let reply = self.call(method, params).await?;
        let outcome = classify_json_rpc(&reply).map_err(TransportError::Request)?;
        tracing::debug!("coordinator {} answered {}", method, outcome);
        Ok(outcome)
    }

    async fn call_query<P: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<T> {
        let reply = self.call(method, params).await?;
        if let Some(error) = reply.error {
            return Err(TransportError::Request(format!(
                "{} failed with {}: {}",
                method, error.code, error.message
            )));
        }
        let result = reply.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result)
            .map_err(|e| TransportError::Decode(format!("{} reply: {}", method, e)))
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    fn protocol(&self) -> Protocol {
        Protocol::JsonRpc
    }

    fn server(&self) -> &str {
        &self.server
    }

    async fn generate_gid(&self) -> Result<String> {
        let reply = self.call(ops::NEW_GID, &serde_json::json!({})).await?;
        let outcome = classify_json_rpc(&reply).map_err(TransportError::Request)?;
        let body = reply
            .result
            .and_then(|result| serde_json::from_value::<DtmResponse>(result).ok())
            .unwrap_or_default();

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
        dispatch_http(&self.client, request).await
    }
}
