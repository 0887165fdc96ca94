//! Protocol definitions for coordinator and branch communication
//!
//! This crate defines the bodies exchanged with the coordinator's control
//! endpoints, the outbound/inbound form of branch calls, and the rules that
//! turn a raw response into an [`Outcome`](dtx_common::Outcome).

pub mod branch;
pub mod messages;
pub mod query;
pub mod responses;

pub use branch::{BranchParams, BranchRequest};
pub use messages::{RegisterBranchRequest, TransOptions, TransRequest};
pub use query::{QueryAllResult, QueryFilter, TransBranch, TransGlobal, TransQuery};
pub use responses::{
    DtmResponse, JsonRpcError, JsonRpcRequest, JsonRpcResponse, classify_http,
    classify_json_rpc,
};
