//! Error types for the preload crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `FetchError`: Errors from preload fetchers
//!
//! The orchestrator itself never throws; it records these as per-triple
//! outcomes. Fetcher implementations map their connector's errors (broker,
//! protocol, parsing) into the variants here.

use amber_relay_cache::CacheError;
use std::fmt;

/// Errors from a preload fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The account needs human re-authorization. Not retryable.
    AuthorizationRequired { message: String },
    /// The upstream service call failed.
    Upstream { message: String },
    /// The cache layer failed while serving this fetch.
    Cache { message: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationRequired { message } => {
                write!(f, "re-authorization required: {message}")
            }
            Self::Upstream { message } => {
                write!(f, "upstream fetch failed: {message}")
            }
            Self::Cache { message } => {
                write!(f, "cache operation failed: {message}")
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl From<CacheError> for FetchError {
    fn from(error: CacheError) -> Self {
        Self::Cache {
            message: error.to_string(),
        }
    }
}
