//! Sub-branch id generation
//!
//! A branch id is its parent's id followed by a two-digit sequence number, so
//! ids stay unique within one global transaction and sort in issue order:
//! the root issues `01`, `02`, ...; branch `01` issues `0101`, `0102`, ...

use crate::constants::MAX_SUB_BRANCHES;
use crate::error::{ContextError, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic generator of sub-branch ids under one parent branch
#[derive(Debug, Default)]
pub struct BranchIdGenerator {
    parent: String,
    issued: AtomicU32,
}

impl BranchIdGenerator {
    pub fn new(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            issued: AtomicU32::new(0),
        }
    }

    /// Parent branch id (empty for the global transaction itself)
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Number of ids issued so far
    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Issue the next sub-branch id; the counter never moves past the limit
    pub fn next_id(&self) -> Result<String> {
        let seq = self
            .issued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < MAX_SUB_BRANCHES).then_some(n + 1)
            })
            .map_err(|_| ContextError::BranchIdExhausted(self.parent.clone()))?
            + 1;
        Ok(format!("{}{:02}", self.parent, seq))
    }
}
