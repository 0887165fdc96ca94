//! Transport to the coordinator and to peer branches
//!
//! One [`Transport`] implementation exists per wire protocol and is chosen
//! once, when the transport is built from a [`TransportConfig`]:
//! - [`HttpTransport`]: request/response, context in query parameters
//! - [`JsonRpcTransport`]: JSON-RPC 2.0 envelopes to the coordinator
//! - [`RpcTransport`]: context in call metadata over an `RpcChannel`
//!
//! Every reply is classified into an [`Outcome`]. Errors are reserved for
//! transport-level failures; a FAILURE or ONGOING answer is a successful call.

mod config;
mod error;
mod http;
mod jsonrpc;
mod rpc;

pub use config::{Protocol, TransportConfig, build_transport};
pub use error::{Result, TransportError};
pub use http::HttpTransport;
pub use jsonrpc::JsonRpcTransport;
pub use rpc::RpcTransport;

use async_trait::async_trait;
use dtx_common::Outcome;
use dtx_protocol::{
    BranchRequest, QueryAllResult, QueryFilter, RegisterBranchRequest, TransQuery, TransRequest,
};

/// Coordinator control endpoint names
pub mod ops {
    pub const NEW_GID: &str = "newGid";
    pub const PREPARE: &str = "prepare";
    pub const SUBMIT: &str = "submit";
    pub const ABORT: &str = "abort";
    pub const REGISTER_BRANCH: &str = "registerBranch";
    pub const QUERY: &str = "query";
    pub const QUERY_ALL: &str = "queryAll";
}

/// Classified reply of a branch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchReply {
    pub outcome: Outcome,
    /// Raw reply body, for callers that need the branch's answer
    pub body: Vec<u8>,
}

/// Dispatcher to the coordinator's control endpoints and to branches
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wire protocol of this transport
    fn protocol(&self) -> Protocol;

    /// Coordinator address, embedded in outbound branch calls
    fn server(&self) -> &str;

    /// Ask the coordinator for a new global transaction id
    async fn generate_gid(&self) -> Result<String>;

    async fn prepare(&self, body: &TransRequest) -> Result<Outcome>;

    async fn submit(&self, body: &TransRequest) -> Result<Outcome>;

    async fn abort(&self, body: &TransRequest) -> Result<Outcome>;

    async fn register_branch(&self, body: &RegisterBranchRequest) -> Result<Outcome>;

    /// Status of one global transaction and its branches
    async fn query(&self, gid: &str) -> Result<TransQuery>;

    /// One page of global transactions matching `filter`
    async fn query_all(&self, filter: &QueryFilter) -> Result<QueryAllResult>;

    /// Send one call to a peer branch
    async fn dispatch_branch(&self, request: &BranchRequest) -> Result<BranchReply>;
}
