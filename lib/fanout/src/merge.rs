//! Merging fanned-out result lists.
//!
//! Used when one logical query runs against every instance of a multi-site
//! connector: each instance returns a list, and the caller wants one list
//! where every item still knows which instance produced it.

use crate::branch::BranchResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// An item tagged with the branch that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenanced<T> {
    /// Label of the originating branch (account name, instance host).
    pub source: String,
    /// The item itself.
    pub item: T,
}

/// Flattens per-branch lists into one provenance-tagged list,
/// de-duplicating by a natural key.
///
/// When instances can overlap (mirrored trackers, shared mailboxes), the
/// first occurrence of a key wins and later duplicates are dropped. Items
/// keep arrival order, which carries no meaning across branches; sort the
/// returned list by a timestamp field when presentation order matters.
pub fn merge_by_key<T, K, F>(results: Vec<BranchResult<Vec<T>>>, key: F) -> Vec<Provenanced<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for result in results {
        for item in result.value {
            if seen.insert(key(&item)) {
                merged.push(Provenanced {
                    source: result.branch.clone(),
                    item,
                });
            }
        }
    }

    merged
}
