//! Barrier records and their keys

use dtx_common::{Op, TransType};
use serde::{Deserialize, Serialize};

const KEY_SEPARATOR: char = '\u{1f}';

/// Unique key of one barrier record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarrierKey {
    pub trans_type: TransType,
    pub gid: String,
    pub branch_id: String,
    pub op: Op,
    pub barrier_id: String,
}

impl BarrierKey {
    pub fn new(
        trans_type: TransType,
        gid: impl Into<String>,
        branch_id: impl Into<String>,
        op: Op,
        barrier_id: impl Into<String>,
    ) -> Self {
        Self {
            trans_type,
            gid: gid.into(),
            branch_id: branch_id.into(),
            op,
            barrier_id: barrier_id.into(),
        }
    }

    /// Same branch and barrier id, another operation
    pub fn with_op(&self, op: Op) -> Self {
        Self {
            op,
            ..self.clone()
        }
    }

    /// Byte key used by ordered stores; records of one gid sort together
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{gid}{s}{trans_type}{s}{branch_id}{s}{op}{s}{barrier_id}",
            gid = self.gid,
            trans_type = self.trans_type,
            branch_id = self.branch_id,
            op = self.op,
            barrier_id = self.barrier_id,
            s = KEY_SEPARATOR,
        )
        .into_bytes()
    }

    /// Prefix shared by every record of `gid`
    pub fn gid_prefix(gid: &str) -> Vec<u8> {
        format!("{}{}", gid, KEY_SEPARATOR).into_bytes()
    }
}

/// One row of the barrier table.
///
/// `reason` is the operation whose execution inserted the row. It differs
/// from `key.op` only for placeholders written by a compensation that found
/// no forward operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierRecord {
    pub key: BarrierKey,
    pub reason: Op,
}

impl BarrierRecord {
    pub fn new(key: BarrierKey, reason: Op) -> Self {
        Self { key, reason }
    }
}
