//! Transactional store contract used by the barrier
//!
//! A store hands out transactions. Barrier rows and the business data the
//! guarded effect writes go through the same transaction, so they commit or
//! roll back together.

use crate::error::Result;
use crate::record::{BarrierKey, BarrierRecord};
use async_trait::async_trait;

/// A resource manager that can open local transactions
#[async_trait]
pub trait BarrierStore: Send + Sync + 'static {
    type Tx: BarrierTx;

    /// Open a transaction; at most one is active per store at a time
    async fn begin(&self) -> Result<Self::Tx>;
}

/// One local transaction of a [`BarrierStore`]
#[async_trait]
pub trait BarrierTx: DataTx + Send + Sized {
    /// Insert `record` unless its key exists; returns whether it was inserted
    async fn insert_if_absent(&mut self, record: &BarrierRecord) -> Result<bool>;

    async fn get(&mut self, key: &BarrierKey) -> Result<Option<BarrierRecord>>;

    async fn commit(self) -> Result<()>;

    /// Discard every write of this transaction. Dropping has the same effect.
    async fn rollback(self) -> Result<()>;
}

/// Business key/value area written by guarded effects
pub trait DataTx {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn write(&mut self, key: &str, value: Vec<u8>);

    fn delete(&mut self, key: &str);
}
