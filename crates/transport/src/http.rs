//! Request/response transport over HTTP

use crate::error::{Result, TransportError};
use crate::{BranchReply, Protocol, Transport, ops};
use async_trait::async_trait;
use dtx_common::Outcome;
use dtx_protocol::{
    BranchRequest, DtmResponse, QueryAllResult, QueryFilter, RegisterBranchRequest, TransQuery,
    TransRequest, classify_http,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP transport; the coordinator lives under `server`
pub struct HttpTransport {
    client: reqwest::Client,
    server: String,
}

impl HttpTransport {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("HTTP client error: {}", e)))?;
        Ok(Self::with_client(client, server))
    }

    /// Use a client configured by the host (pooling, TLS, proxies)
    pub fn with_client(client: reqwest::Client, server: impl Into<String>) -> Self {
        Self {
            client,
            server: server.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/{}", self.server, op)
    }

    /// POST a control body and classify the reply
    async fn call_dtm<B: Serialize + Sync>(&self, op: &str, body: &B) -> Result<Outcome> {
        let response = self.client.post(self.endpoint(op)).json(body).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let outcome = classified(op, status, &bytes)?;
        tracing::debug!("coordinator {} answered {}", op, outcome);
        Ok(outcome)
    }

    /// GET a read-only endpoint and decode its body
    async fn get_json<T: DeserializeOwned>(
        &self,
        op: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let response = self.client.get(self.endpoint(op)).query(query).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(TransportError::Request(format!(
                "{} returned {}: {}",
                op,
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::Decode(format!("{} reply: {}", op, e)))
    }
}

/// Classify a reply, turning "no protocol result" into a transport failure
pub(crate) fn classified(what: &str, status: u16, body: &[u8]) -> Result<Outcome> {
    classify_http(status, body).ok_or_else(|| {
        TransportError::Request(format!(
            "{} returned {}: {}",
            what,
            status,
            String::from_utf8_lossy(body)
        ))
    })
}

/// Send a branch call as a plain HTTP request
pub(crate) async fn dispatch_http(
    client: &reqwest::Client,
    request: &BranchRequest,
) -> Result<BranchReply> {
    let mut builder = client
        .post(&request.url)
        .query(&request.query_params())
        .json(&request.payload);
    for (name, value) in &request.branch_headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    let outcome = classified(&request.url, status, &body)?;

    tracing::debug!(
        "branch {} {} of {} answered {}",
        request.branch_id,
        request.op,
        request.gid,
        outcome
    );
    Ok(BranchReply { outcome, body })
}

#[async_trait]
impl Transport for HttpTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    fn server(&self) -> &str {
        &self.server
    }

    async fn generate_gid(&self) -> Result<String> {
        let response = self.client.get(self.endpoint(ops::NEW_GID)).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let reply = DtmResponse::from_slice(&bytes).unwrap_or_default();

        match (classify_http(status, &bytes), reply.gid) {
            (Some(Outcome::Success), Some(gid)) if !gid.is_empty() => Ok(gid),
            (None, _) => Err(TransportError::Request(format!(
                "{} returned {}: {}",
                ops::NEW_GID,
                status,
                String::from_utf8_lossy(&bytes)
            ))),
            _ => Err(TransportError::GenerationFailed(
                reply.message.unwrap_or_default(),
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
        self.get_json(ops::QUERY, &[("gid", gid.to_string())]).await
    }

    async fn query_all(&self, filter: &QueryFilter) -> Result<QueryAllResult> {
        self.get_json(ops::QUERY_ALL, &filter.query_params()).await
    }

    async fn dispatch_branch(&self, request: &BranchRequest) -> Result<BranchReply> {
        dispatch_http(&self.client, request).await
    }
}
