//! Barrier store backed by an embedded fjall keyspace
//!
//! Barrier rows and business values live in two partitions of one keyspace.
//! A transaction stages its writes and commits them in a single fjall batch,
//! so guard rows and the effect's writes become durable together.

use crate::error::{BarrierError, Result};
use crate::record::{BarrierKey, BarrierRecord};
use crate::store::{BarrierStore, BarrierTx, DataTx};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const BARRIER_PARTITION: &str = "barriers";
const DATA_PARTITION: &str = "data";

/// Durable barrier store
#[derive(Clone)]
pub struct FjallBarrierStore {
    keyspace: Keyspace,
    barriers: PartitionHandle,
    data: PartitionHandle,
    persist_mode: PersistMode,
    // One writer at a time; readers of committed state are not blocked
    writer: Arc<Mutex<()>>,
}

impl FjallBarrierStore {
    /// Open or create the store under `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let keyspace = fjall::Config::new(path).open()?;
        let barriers = keyspace.open_partition(
            BARRIER_PARTITION,
            PartitionCreateOptions::default().compression(fjall::CompressionType::None),
        )?;
        let data = keyspace.open_partition(DATA_PARTITION, PartitionCreateOptions::default())?;

        tracing::debug!("opened barrier store at {}", path.display());
        Ok(Self {
            keyspace,
            barriers,
            data,
            persist_mode: PersistMode::SyncAll,
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// How commits are flushed; `SyncAll` unless changed
    pub fn with_persist_mode(mut self, mode: PersistMode) -> Self {
        self.persist_mode = mode;
        self
    }

    /// Committed barrier rows of `gid`
    pub fn records(&self, gid: &str) -> Result<Vec<BarrierRecord>> {
        self.barriers
            .prefix(BarrierKey::gid_prefix(gid))
            .map(|entry| -> Result<BarrierRecord> {
                let (_, value) = entry?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    /// Committed business value under `key`
    pub fn value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key)?.map(|value| value.to_vec()))
    }

    fn committed_record(&self, key: &BarrierKey) -> Result<Option<BarrierRecord>> {
        match self.barriers.get(key.encode())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BarrierStore for FjallBarrierStore {
    type Tx = FjallTx;

    async fn begin(&self) -> Result<FjallTx> {
        let guard = self.writer.clone().lock_owned().await;
        Ok(FjallTx {
            store: self.clone(),
            _guard: guard,
            barriers: BTreeMap::new(),
            data: BTreeMap::new(),
        })
    }
}

/// Transaction of a [`FjallBarrierStore`]
pub struct FjallTx {
    store: FjallBarrierStore,
    _guard: OwnedMutexGuard<()>,
    barriers: BTreeMap<Vec<u8>, BarrierRecord>,
    data: BTreeMap<String, Option<Vec<u8>>>,
}

#[async_trait]
impl BarrierTx for FjallTx {
    async fn insert_if_absent(&mut self, record: &BarrierRecord) -> Result<bool> {
        let key = record.key.encode();
        if self.barriers.contains_key(&key) || self.store.barriers.contains_key(&key)? {
            return Ok(false);
        }
        self.barriers.insert(key, record.clone());
        Ok(true)
    }

    async fn get(&mut self, key: &BarrierKey) -> Result<Option<BarrierRecord>> {
        match self.barriers.get(&key.encode()) {
            Some(record) => Ok(Some(record.clone())),
            None => self.store.committed_record(key),
        }
    }

    async fn commit(self) -> Result<()> {
        if self.barriers.is_empty() && self.data.is_empty() {
            return Ok(());
        }

        let mut batch = self.store.keyspace.batch();
        for (key, record) in &self.barriers {
            batch.insert(&self.store.barriers, key.clone(), serde_json::to_vec(record)?);
        }
        for (key, value) in &self.data {
            match value {
                Some(value) => batch.insert(&self.store.data, key.as_bytes(), value.clone()),
                None => batch.remove(&self.store.data, key.as_bytes()),
            }
        }
        batch.commit()?;
        self.store
            .keyspace
            .persist(self.store.persist_mode)
            .map_err(|e| BarrierError::Storage(format!("persist failed: {}", e)))?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

impl DataTx for FjallTx {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.data.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.store.value(key),
        }
    }

    fn write(&mut self, key: &str, value: Vec<u8>) {
        self.data.insert(key.to_string(), Some(value));
    }

    fn delete(&mut self, key: &str) {
        self.data.insert(key.to_string(), None);
    }
}
