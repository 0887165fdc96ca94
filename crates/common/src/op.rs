//! Branch operations

use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation tag carried by every branch call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// TCC phase 1
    Try,
    /// TCC phase 2 success
    Confirm,
    /// TCC phase 2 failure
    Cancel,
    /// SAGA / XA / MSG forward effect
    Action,
    /// SAGA compensation
    Compensate,
    /// XA phase 2 success
    Commit,
    /// XA phase 2 failure
    Rollback,
    /// Local transaction of a two-phase message
    Msg,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Try => "try",
            Op::Confirm => "confirm",
            Op::Cancel => "cancel",
            Op::Action => "action",
            Op::Compensate => "compensate",
            Op::Commit => "commit",
            Op::Rollback => "rollback",
            Op::Msg => "msg",
        }
    }

    /// Coordinator-driven follow-up operations.
    pub fn is_phase_two(&self) -> bool {
        matches!(
            self,
            Op::Confirm | Op::Cancel | Op::Compensate | Op::Commit | Op::Rollback
        )
    }

    /// Operations that undo a forward effect.
    pub fn is_compensating(&self) -> bool {
        self.origin().is_some()
    }

    /// The forward operation a compensating operation undoes.
    pub fn origin(&self) -> Option<Op> {
        match self {
            Op::Cancel => Some(Op::Try),
            Op::Compensate | Op::Rollback => Some(Op::Action),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Op {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "try" => Ok(Op::Try),
            "confirm" => Ok(Op::Confirm),
            "cancel" => Ok(Op::Cancel),
            "action" => Ok(Op::Action),
            "compensate" => Ok(Op::Compensate),
            "commit" => Ok(Op::Commit),
            "rollback" => Ok(Op::Rollback),
            "msg" => Ok(Op::Msg),
            other => Err(ContextError::UnknownOp(other.to_string())),
        }
    }
}
