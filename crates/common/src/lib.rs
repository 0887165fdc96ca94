//! Shared vocabulary for the distributed-transaction client
//!
//! This crate defines:
//! - Transaction patterns (`TransType`) and branch operations (`Op`)
//! - The three-way remote `Outcome`
//! - The call-scoped `TransactionContext` and sub-branch id generation

mod branch_id;
pub mod constants;
mod context;
mod error;
mod op;
mod outcome;
mod trans_type;

pub use branch_id::BranchIdGenerator;
pub use context::TransactionContext;
pub use error::{ContextError, Result};
pub use op::Op;
pub use outcome::Outcome;
pub use trans_type::TransType;
