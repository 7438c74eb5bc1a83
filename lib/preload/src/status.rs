//! Read-only cache status diagnostic.
//!
//! Joins the persisted cache rows of every enabled account against the keys
//! registered for its connector type. Makes no network calls; safe to run
//! from an admin surface at any time.

use crate::orchestrator::PreloadOrchestrator;
use amber_relay_account::Account;
use amber_relay_core::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Freshness of one registered cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheFreshness {
    /// No row persisted for this key.
    Missing,
    /// A row exists and its TTL has not elapsed.
    Fresh { expires_at: DateTime<Utc> },
    /// A row exists but its TTL elapsed.
    Stale { expired_at: DateTime<Utc> },
}

/// Status of one registered cache key for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyStatus {
    /// The account the key belongs to.
    pub account_id: AccountId,
    /// The account's display name.
    pub account_name: String,
    /// The registered cache key.
    pub cache_key: String,
    /// Freshness of the persisted row, if any.
    pub freshness: CacheFreshness,
}

impl PreloadOrchestrator {
    /// Reports the freshness of every registered key for every enabled
    /// account.
    ///
    /// Purely a join of persisted rows against the registry; no fetcher is
    /// invoked and no network call is made.
    pub async fn cache_status(&self, accounts: &[Account]) -> Vec<CacheKeyStatus> {
        let now = Utc::now();
        let mut statuses = Vec::new();

        for account in accounts.iter().filter(|account| account.enabled) {
            let rows = match self.cache.entries(account.id).await {
                Ok(rows) => rows,
                Err(error) => {
                    tracing::warn!(
                        account = %account.name,
                        %error,
                        "listing cache rows failed; reporting keys as missing"
                    );
                    Vec::new()
                }
            };
            let by_key: HashMap<&str, DateTime<Utc>> = rows
                .iter()
                .map(|row| (row.cache_key.as_str(), row.expires_at))
                .collect();

            for cache_key in self.registry.registered_keys(&account.connector_type) {
                let freshness = match by_key.get(cache_key) {
                    None => CacheFreshness::Missing,
                    Some(&expires_at) if expires_at < now => CacheFreshness::Stale {
                        expired_at: expires_at,
                    },
                    Some(&expires_at) => CacheFreshness::Fresh { expires_at },
                };

                statuses.push(CacheKeyStatus {
                    account_id: account.id,
                    account_name: account.name.clone(),
                    cache_key: cache_key.to_string(),
                    freshness,
                });
            }
        }

        statuses
    }
}
