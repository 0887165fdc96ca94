//! Entry point of the transaction engine

use crate::config::ClientConfig;
use crate::dispatcher::BranchDispatcher;
use crate::error::{ClientError, Result};
use crate::global::GlobalTransaction;
use crate::msg::Msg;
use crate::participant::Participant;
use crate::saga::Saga;
use crate::tcc::TccTransaction;
use crate::xa::XaTransaction;
use dtx_barrier::BarrierStore;
use dtx_common::TransType;
use dtx_protocol::{QueryAllResult, QueryFilter, TransQuery, TransRequest};
use dtx_rpc::RpcChannel;
use dtx_transport::{Transport, build_transport};
use std::future::Future;
use std::sync::Arc;

/// Starts global transactions and serves branch calls through one transport
#[derive(Clone)]
pub struct DtxClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl DtxClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Use an existing transport; `config.transport` is ignored
    pub fn with_config(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Build the transport `config` selects
    pub fn from_config(
        config: ClientConfig,
        rpc_channel: Option<Arc<dyn RpcChannel>>,
    ) -> Result<Self> {
        let transport = build_transport(&config.transport, rpc_channel)?;
        Ok(Self::with_config(transport, config))
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> BranchDispatcher {
        BranchDispatcher::new(self.transport.clone())
    }

    /// Serve branch calls against `store`
    pub fn participant<S: BarrierStore>(&self, store: Arc<S>) -> Participant<S> {
        Participant::new(self.transport.clone(), store)
    }

    pub async fn generate_gid(&self) -> Result<String> {
        Ok(self.transport.generate_gid().await?)
    }

    async fn gid_or_new(&self, gid: Option<String>) -> Result<String> {
        match gid {
            Some(gid) if !gid.is_empty() => Ok(gid),
            _ => self.generate_gid().await,
        }
    }

    fn global(&self, gid: String, trans_type: TransType) -> Arc<GlobalTransaction> {
        let request = TransRequest::new(gid, trans_type).with_options(self.config.options.clone());
        Arc::new(GlobalTransaction::new(
            self.transport.clone(),
            request,
            self.config.callback_timeout(),
        ))
    }

    /// Run an XA global transaction.
    ///
    /// A gid is requested from the coordinator when `gid` is `None`. The
    /// callback's result decides between submit and abort.
    pub async fn xa_global_transaction<F, Fut, T>(
        &self,
        gid: Option<String>,
        callback: F,
    ) -> Result<T>
    where
        F: FnOnce(XaTransaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let global = self.global(self.gid_or_new(gid).await?, TransType::Xa);
        let xa = XaTransaction::new(global.clone(), self.dispatcher());
        global.run(|| callback(xa)).await
    }

    /// Run a TCC global transaction
    pub async fn tcc_global_transaction<F, Fut, T>(
        &self,
        gid: Option<String>,
        callback: F,
    ) -> Result<T>
    where
        F: FnOnce(TccTransaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let global = self.global(self.gid_or_new(gid).await?, TransType::Tcc);
        let tcc = TccTransaction::new(global.clone(), self.dispatcher());
        global.run(|| callback(tcc)).await
    }

    pub fn saga(&self, gid: impl Into<String>) -> Saga {
        Saga::new(
            self.transport.clone(),
            gid.into(),
            self.config.options.clone(),
            self.config.callback_timeout(),
        )
    }

    pub fn msg(&self, gid: impl Into<String>) -> Msg {
        Msg::new(self.transport.clone(), gid.into(), self.config.options.clone())
    }

    /// Status of one global transaction as the coordinator sees it
    pub async fn query(&self, gid: &str) -> Result<TransQuery> {
        if gid.is_empty() {
            return Err(ClientError::ProtocolMisuse("query without gid".to_string()));
        }
        Ok(self.transport.query(gid).await?)
    }

    pub async fn query_all(&self, filter: &QueryFilter) -> Result<QueryAllResult> {
        Ok(self.transport.query_all(filter).await?)
    }
}
