//! In-process barrier store
//!
//! Transactions are serialized: `begin` waits until the previous transaction
//! has committed or rolled back. Writes are staged in the transaction and
//! applied to the shared tables on commit.

use crate::error::Result;
use crate::record::{BarrierKey, BarrierRecord};
use crate::store::{BarrierStore, BarrierTx, DataTx};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Tables {
    barriers: HashMap<BarrierKey, BarrierRecord>,
    data: BTreeMap<String, Vec<u8>>,
}

/// Barrier store kept in memory, for tests and single-process hosts
#[derive(Debug, Clone, Default)]
pub struct MemoryBarrierStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryBarrierStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed barrier rows of `gid`
    pub async fn records(&self, gid: &str) -> Vec<BarrierRecord> {
        self.tables
            .lock()
            .await
            .barriers
            .values()
            .filter(|record| record.key.gid == gid)
            .cloned()
            .collect()
    }

    /// Committed business value under `key`
    pub async fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.tables.lock().await.data.get(key).cloned()
    }
}

#[async_trait]
impl BarrierStore for MemoryBarrierStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(MemoryTx {
            tables,
            barriers: HashMap::new(),
            data: BTreeMap::new(),
        })
    }
}

/// Transaction of a [`MemoryBarrierStore`]
pub struct MemoryTx {
    tables: OwnedMutexGuard<Tables>,
    barriers: HashMap<BarrierKey, BarrierRecord>,
    // None marks a staged delete
    data: BTreeMap<String, Option<Vec<u8>>>,
}

#[async_trait]
impl BarrierTx for MemoryTx {
    async fn insert_if_absent(&mut self, record: &BarrierRecord) -> Result<bool> {
        if self.tables.barriers.contains_key(&record.key) || self.barriers.contains_key(&record.key)
        {
            return Ok(false);
        }
        self.barriers.insert(record.key.clone(), record.clone());
        Ok(true)
    }

    async fn get(&mut self, key: &BarrierKey) -> Result<Option<BarrierRecord>> {
        Ok(self
            .barriers
            .get(key)
            .or_else(|| self.tables.barriers.get(key))
            .cloned())
    }

    async fn commit(mut self) -> Result<()> {
        let barriers = std::mem::take(&mut self.barriers);
        self.tables.barriers.extend(barriers);
        for (key, value) in std::mem::take(&mut self.data) {
            match value {
                Some(value) => self.tables.data.insert(key, value),
                None => self.tables.data.remove(&key),
            };
        }
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

impl DataTx for MemoryTx {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.data.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.tables.data.get(key).cloned()),
        }
    }

    fn write(&mut self, key: &str, value: Vec<u8>) {
        self.data.insert(key.to_string(), Some(value));
    }

    fn delete(&mut self, key: &str) {
        self.data.insert(key.to_string(), None);
    }
}
