//! Branch types for fan-out calls.

use serde::{Deserialize, Serialize};

/// One unit of parallel work in a fan-out call.
///
/// Branches exist only for the duration of a call; they are never persisted.
#[derive(Debug, Clone)]
pub struct Branch<T> {
    /// Human-readable label, used for provenance and logs (e.g. the account
    /// name or the instance hostname).
    pub label: String,
    /// What the branch function operates on.
    pub target: T,
}

impl<T> Branch<T> {
    /// Creates a branch.
    #[must_use]
    pub fn new(label: impl Into<String>, target: T) -> Self {
        Self {
            label: label.into(),
            target,
        }
    }
}

/// A branch's label paired with its successful outcome.
///
/// This is the unit of provenance in merged output: every value knows which
/// branch produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchResult<R> {
    /// Label of the branch that produced the value.
    pub branch: String,
    /// The branch function's output.
    pub value: R,
}
