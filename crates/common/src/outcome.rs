//! Three-way classification of remote responses

use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol-level result reported by the coordinator or a branch.
///
/// `Ongoing` is neither success nor failure: the remote side has not decided
/// yet and will be asked again by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Failure,
    Ongoing,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Ongoing => "ONGOING",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Outcome::Success),
            "FAILURE" => Ok(Outcome::Failure),
            "ONGOING" => Ok(Outcome::Ongoing),
            other => Err(ContextError::UnknownOutcome(other.to_string())),
        }
    }
}
