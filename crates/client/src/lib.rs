//! Participant-side engine for distributed transactions
//!
//! [`DtxClient`] starts global transactions in four patterns and talks to
//! the coordinator through a [`Transport`](dtx_transport::Transport):
//! - XA: [`DtxClient::xa_global_transaction`]
//! - TCC: [`DtxClient::tcc_global_transaction`]
//! - SAGA: [`DtxClient::saga`]
//! - two-phase messages: [`DtxClient::msg`]
//!
//! The same client serves inbound branch calls through a [`Participant`],
//! which runs a [`BranchHandler`] behind the resource barrier.

mod client;
mod config;
mod dispatcher;
mod error;
mod global;
mod msg;
mod participant;
mod saga;
mod tcc;
mod xa;

pub use client::DtxClient;
pub use config::ClientConfig;
pub use dispatcher::BranchDispatcher;
pub use error::{ClientError, Result};
pub use global::{GlobalTransaction, TransactionState};
pub use msg::Msg;
pub use participant::{BranchHandler, Participant};
pub use saga::{Saga, SagaStep};
pub use tcc::TccTransaction;
pub use xa::XaTransaction;
