//! Transaction patterns

use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pattern a global transaction follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransType {
    /// Resource managers prepare locally; one global commit/rollback decision
    Xa,
    /// Try/confirm/cancel per branch
    Tcc,
    /// Ordered actions with compensations
    Saga,
    /// Two-phase message: local transaction, then guaranteed delivery
    Msg,
}

impl TransType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransType::Xa => "xa",
            TransType::Tcc => "tcc",
            TransType::Saga => "saga",
            TransType::Msg => "msg",
        }
    }

    /// Whether participants register their own branch after phase 1.
    ///
    /// TCC branches are registered by the caller; SAGA and MSG branches are
    /// declared up front in `prepare`/`submit`.
    pub fn registers_on_participant(&self) -> bool {
        matches!(self, TransType::Xa)
    }
}

impl fmt::Display for TransType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransType {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xa" => Ok(TransType::Xa),
            "tcc" => Ok(TransType::Tcc),
            "saga" => Ok(TransType::Saga),
            "msg" => Ok(TransType::Msg),
            _ => Err(ContextError::UnknownTransType(s.to_string())),
        }
    }
}
