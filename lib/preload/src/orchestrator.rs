//! The preload orchestrator.
//!
//! Warms the cache for every enabled account ahead of interactive use.
//! Triples for one account execute sequentially so a single backend never
//! sees a burst of parallel preload calls; accounts execute in parallel so
//! total preload latency is bounded by the slowest account, not the sum.

use crate::error::FetchError;
use crate::registry::{PreloadEntry, PreloadRegistry};
use amber_relay_account::Account;
use amber_relay_cache::CacheStore;
use amber_relay_core::AccountId;
use amber_relay_fanout::{Branch, FanOutRouter};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::convert::Infallible;

/// Outcome of one preload triple for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreloadStatus {
    /// A fresh entry was already cached; no network call happened.
    Hit,
    /// The fetcher ran and its payload was stored.
    Fetched,
    /// The fetch or store failed; carries the raw error text.
    Failed { error: String },
}

/// One recorded preload outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadOutcome {
    /// The account the triple ran for.
    pub account_id: AccountId,
    /// The account's display name.
    pub account_name: String,
    /// The triple's cache key.
    pub cache_key: String,
    /// What happened.
    pub status: PreloadStatus,
}

/// Warms caches across all enabled accounts.
pub struct PreloadOrchestrator {
    pub(crate) registry: PreloadRegistry,
    pub(crate) cache: CacheStore,
}

impl PreloadOrchestrator {
    /// Creates an orchestrator over a registry and cache store.
    #[must_use]
    pub fn new(registry: PreloadRegistry, cache: CacheStore) -> Self {
        Self { registry, cache }
    }

    /// Warms every registered triple for every enabled account.
    ///
    /// Never fails: each per-triple problem becomes a recorded
    /// `PreloadStatus::Failed` outcome. Disabled accounts are skipped
    /// entirely.
    pub async fn warm_all(&self, accounts: &[Account]) -> Vec<PreloadOutcome> {
        let branches: Vec<Branch<Account>> = accounts
            .iter()
            .filter(|account| account.enabled)
            .map(|account| Branch::new(account.name.clone(), account.clone()))
            .collect();

        let results = FanOutRouter::query_all(branches, None, |branch| async move {
            Ok::<_, Infallible>(self.warm_account(branch.target).await)
        })
        .await;

        results
            .into_iter()
            .flat_map(|result| result.value)
            .collect()
    }

    /// Warms one account's triples, in registration order.
    async fn warm_account(&self, account: Account) -> Vec<PreloadOutcome> {
        let entries = self.registry.entries_for(&account.connector_type);
        let mut outcomes = Vec::with_capacity(entries.len());

        for entry in entries {
            let status = self.warm_entry(&account, entry).await;
            outcomes.push(PreloadOutcome {
                account_id: account.id,
                account_name: account.name.clone(),
                cache_key: entry.cache_key.clone(),
                status,
            });
        }

        outcomes
    }

    async fn warm_entry(&self, account: &Account, entry: &PreloadEntry) -> PreloadStatus {
        match self
            .cache
            .get::<JsonValue>(account.id, &entry.cache_key)
            .await
        {
            Ok(Some(_)) => return PreloadStatus::Hit,
            Ok(None) => {}
            Err(error) => {
                // A broken cache read degrades to a miss; the fetch below
                // still gets its chance to warm the entry.
                tracing::warn!(
                    account = %account.name,
                    cache_key = %entry.cache_key,
                    %error,
                    "cache read failed during preload"
                );
            }
        }

        match entry.fetcher.fetch(account).await {
            Ok(payload) => {
                match self
                    .cache
                    .set(account.id, &entry.cache_key, &payload, entry.ttl)
                    .await
                {
                    Ok(()) => PreloadStatus::Fetched,
                    Err(error) => PreloadStatus::Failed {
                        error: error.to_string(),
                    },
                }
            }
            Err(error) => {
                tracing::warn!(
                    account = %account.name,
                    cache_key = %entry.cache_key,
                    %error,
                    "preload fetch failed"
                );
                PreloadStatus::Failed {
                    error: error.to_string(),
                }
            }
        }
    }

    /// Drives the account's first registered fetcher once, bypassing the
    /// cache.
    ///
    /// This is the interactive "test connection" path: unlike preload it
    /// surfaces the raw error so a human can act on it. Nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unmodified, or `FetchError::Upstream`
    /// when the connector type has no registered fetchers.
    pub async fn test_connection(&self, account: &Account) -> Result<JsonValue, FetchError> {
        let entry = self
            .registry
            .entries_for(&account.connector_type)
            .first()
            .ok_or_else(|| FetchError::Upstream {
                message: format!(
                    "no preload fetchers registered for connector type '{}'",
                    account.connector_type
                ),
            })?;

        entry.fetcher.fetch(account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PreloadFetcher;
    use amber_relay_cache::{CacheStore, MemoryCacheRepository};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher stub with a fixed result and a call counter.
    struct StubFetcher {
        calls: AtomicUsize,
        result: Result<JsonValue, FetchError>,
    }

    impl StubFetcher {
        fn ok(payload: JsonValue) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Ok(payload),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Err(FetchError::Upstream {
                    message: message.to_string(),
                }),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PreloadFetcher for StubFetcher {
        async fn fetch(&self, _account: &Account) -> Result<JsonValue, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn cache() -> CacheStore {
        CacheStore::new(Arc::new(MemoryCacheRepository::new()))
    }

    fn account(name: &str, connector_type: &str, enabled: bool) -> Account {
        let mut account = Account::new(name.to_string(), connector_type.to_string(), Vec::new());
        account.enabled = enabled;
        account
    }

    fn entry(key: &str, fetcher: Arc<StubFetcher>) -> PreloadEntry {
        PreloadEntry::new(key, Duration::minutes(15), fetcher)
    }

    #[tokio::test]
    async fn cold_keys_are_fetched_and_stored() {
        let cache = cache();
        let fetcher = StubFetcher::ok(json!({"issues": ["A-1"]}));
        let mut registry = PreloadRegistry::new();
        registry.register("issue_tracker", entry("open_issues", fetcher.clone()));
        let orchestrator = PreloadOrchestrator::new(registry, cache.clone());

        let acme = account("acme", "issue_tracker", true);
        let outcomes = orchestrator.warm_all(&[acme.clone()]).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, PreloadStatus::Fetched);
        assert_eq!(outcomes[0].account_name, "acme");
        assert_eq!(fetcher.call_count(), 1);

        let cached: Option<JsonValue> = cache.get(acme.id, "open_issues").await.unwrap();
        assert_eq!(cached, Some(json!({"issues": ["A-1"]})));
    }

    #[tokio::test]
    async fn fresh_entries_are_skipped() {
        let cache = cache();
        let fetcher = StubFetcher::ok(json!({"issues": []}));
        let mut registry = PreloadRegistry::new();
        registry.register("issue_tracker", entry("open_issues", fetcher.clone()));
        let orchestrator = PreloadOrchestrator::new(registry, cache.clone());

        let acme = account("acme", "issue_tracker", true);
        cache
            .set(
                acme.id,
                "open_issues",
                &json!({"issues": ["cached"]}),
                Duration::minutes(15),
            )
            .await
            .unwrap();

        let outcomes = orchestrator.warm_all(&[acme]).await;

        assert_eq!(outcomes[0].status, PreloadStatus::Hit);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn failures_are_recorded_not_thrown() {
        let cache = cache();
        let failing = StubFetcher::failing("503 from tracker");
        let healthy = StubFetcher::ok(json!({"projects": ["P1"]}));
        let mut registry = PreloadRegistry::new();
        registry.register("issue_tracker", entry("open_issues", failing));
        registry.register("issue_tracker", entry("projects", healthy));
        let orchestrator = PreloadOrchestrator::new(registry, cache);

        let outcomes = orchestrator
            .warm_all(&[account("acme", "issue_tracker", true)])
            .await;

        assert_eq!(outcomes.len(), 2);
        match &outcomes[0].status {
            PreloadStatus::Failed { error } => assert!(error.contains("503 from tracker")),
            other => panic!("expected failure, got {other:?}"),
        }
        // The failing triple did not stop its successor.
        assert_eq!(outcomes[1].status, PreloadStatus::Fetched);
    }

    #[tokio::test]
    async fn disabled_accounts_are_skipped() {
        let cache = cache();
        let fetcher = StubFetcher::ok(json!({}));
        let mut registry = PreloadRegistry::new();
        registry.register("issue_tracker", entry("open_issues", fetcher.clone()));
        let orchestrator = PreloadOrchestrator::new(registry, cache);

        let outcomes = orchestrator
            .warm_all(&[account("dormant", "issue_tracker", false)])
            .await;

        assert!(outcomes.is_empty());
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn triples_run_in_registration_order() {
        let cache = cache();
        let mut registry = PreloadRegistry::new();
        registry.register("issue_tracker", entry("projects", StubFetcher::ok(json!([]))));
        registry.register(
            "issue_tracker",
            entry("open_issues", StubFetcher::ok(json!([]))),
        );
        registry.register("issue_tracker", entry("labels", StubFetcher::ok(json!([]))));
        let orchestrator = PreloadOrchestrator::new(registry, cache);

        let outcomes = orchestrator
            .warm_all(&[account("acme", "issue_tracker", true)])
            .await;

        let keys: Vec<&str> = outcomes.iter().map(|o| o.cache_key.as_str()).collect();
        assert_eq!(keys, vec!["projects", "open_issues", "labels"]);
    }

    #[tokio::test]
    async fn accounts_with_unregistered_connector_produce_nothing() {
        let cache = cache();
        let orchestrator = PreloadOrchestrator::new(PreloadRegistry::new(), cache);

        let outcomes = orchestrator
            .warm_all(&[account("acme", "teleporter", true)])
            .await;

        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn multiple_accounts_all_get_warmed() {
        let cache = cache();
        let fetcher = StubFetcher::ok(json!({"n": 1}));
        let mut registry = PreloadRegistry::new();
        registry.register("issue_tracker", entry("open_issues", fetcher.clone()));
        let orchestrator = PreloadOrchestrator::new(registry, cache);

        let outcomes = orchestrator
            .warm_all(&[
                account("acme", "issue_tracker", true),
                account("globex", "issue_tracker", true),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(fetcher.call_count(), 2);
        let mut names: Vec<&str> = outcomes.iter().map(|o| o.account_name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["acme", "globex"]);
    }

    #[tokio::test]
    async fn test_connection_bypasses_cache_and_surfaces_raw_error() {
        let cache = cache();
        let fetcher = StubFetcher::failing("401 invalid_grant");
        let mut registry = PreloadRegistry::new();
        registry.register("issue_tracker", entry("open_issues", fetcher.clone()));
        let orchestrator = PreloadOrchestrator::new(registry, cache.clone());

        let acme = account("acme", "issue_tracker", true);
        // Even a fresh cache entry must not short-circuit the probe.
        cache
            .set(acme.id, "open_issues", &json!({}), Duration::minutes(15))
            .await
            .unwrap();

        let err = orchestrator.test_connection(&acme).await.unwrap_err();
        assert!(err.to_string().contains("401 invalid_grant"));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_connection_without_fetchers_is_an_error() {
        let orchestrator = PreloadOrchestrator::new(PreloadRegistry::new(), cache());

        let err = orchestrator
            .test_connection(&account("acme", "teleporter", true))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("teleporter"));
    }
}
