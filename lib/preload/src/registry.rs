//! The declarative preload registry.
//!
//! Connector implementations register what should be warmed for their
//! connector type: which cache key, how long it stays fresh, and the fetcher
//! that produces it. The orchestrator walks these triples without knowing
//! any provider specifics.

use crate::error::FetchError;
use amber_relay_account::Account;
use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for producing one cacheable payload for one account.
///
/// Implementations typically drive the account's credential broker
/// internally; the orchestrator only sees the resulting JSON.
#[async_trait]
pub trait PreloadFetcher: Send + Sync {
    /// Fetches the payload for this account.
    ///
    /// # Errors
    ///
    /// Returns a `FetchError` describing why the payload could not be
    /// produced; the orchestrator records it, never propagates it.
    async fn fetch(&self, account: &Account) -> Result<JsonValue, FetchError>;
}

/// One registered preload triple.
#[derive(Clone)]
pub struct PreloadEntry {
    /// Cache key the payload is stored under.
    pub cache_key: String,
    /// How long a fetched payload stays fresh.
    pub ttl: Duration,
    /// Produces the payload.
    pub fetcher: Arc<dyn PreloadFetcher>,
}

impl PreloadEntry {
    /// Creates a preload entry.
    #[must_use]
    pub fn new(cache_key: impl Into<String>, ttl: Duration, fetcher: Arc<dyn PreloadFetcher>) -> Self {
        Self {
            cache_key: cache_key.into(),
            ttl,
            fetcher,
        }
    }
}

/// Registry of preload triples per connector type.
#[derive(Default)]
pub struct PreloadRegistry {
    entries: HashMap<String, Vec<PreloadEntry>>,
}

impl PreloadRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a preload entry for a connector type.
    ///
    /// Entries for one connector type are walked in registration order.
    pub fn register(&mut self, connector_type: impl Into<String>, entry: PreloadEntry) {
        self.entries
            .entry(connector_type.into())
            .or_default()
            .push(entry);
    }

    /// Returns the entries registered for a connector type.
    #[must_use]
    pub fn entries_for(&self, connector_type: &str) -> &[PreloadEntry] {
        self.entries
            .get(connector_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the registered cache keys for a connector type.
    #[must_use]
    pub fn registered_keys(&self, connector_type: &str) -> Vec<&str> {
        self.entries_for(connector_type)
            .iter()
            .map(|entry| entry.cache_key.as_str())
            .collect()
    }
}
