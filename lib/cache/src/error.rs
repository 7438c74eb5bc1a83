//! Error types for the cache crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `CacheError`: Errors from cache storage and payload handling
//!
//! Decode failures on read are never surfaced through these types; the store
//! converts them into misses.

use std::fmt;

/// Errors from cache operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Storage operation failed.
    Storage { reason: String },
    /// A payload could not be serialized for storage.
    Serialization { reason: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { reason } => {
                write!(f, "cache storage operation failed: {reason}")
            }
            Self::Serialization { reason } => {
                write!(f, "cache payload serialization failed: {reason}")
            }
        }
    }
}

impl std::error::Error for CacheError {}
