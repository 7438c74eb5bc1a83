//! The cache store: TTL semantics over the persistence seam.
//!
//! Two read strategies are provided:
//!
//! - `get_or_fetch`: strict miss-then-fetch; the caller waits for fresh data
//! - `get_with_background_refresh`: stale-while-revalidate; an expired entry
//!   is served immediately while a detached task fetches a replacement
//!
//! Entry lifecycle: absent → (set) → fresh → (ttl elapses) → stale →
//! (invalidate or lazy delete) → absent. A stale entry read through
//! `get_with_background_refresh` stays stale until the in-flight refresh
//! lands a new row.

use crate::entry::CacheRow;
use crate::error::CacheError;
use crate::repository::CacheRepository;
use amber_relay_core::AccountId;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Result of a stale-while-revalidate read.
#[derive(Debug)]
pub struct CacheRead<T> {
    /// The payload, possibly past its TTL.
    pub data: T,
    /// True when `data` came from an expired entry.
    pub is_stale: bool,
    /// Handle of the detached background refresh, when one was started.
    ///
    /// The refresh is fire-and-forget: its failure is logged, never
    /// propagated. Await the handle only when you need to observe that the
    /// refreshed value has landed (tests, draining on shutdown).
    pub refresh: Option<JoinHandle<()>>,
}

/// TTL-bounded cache of serializable payloads scoped per account.
#[derive(Clone)]
pub struct CacheStore {
    repo: Arc<dyn CacheRepository>,
}

impl CacheStore {
    /// Creates a store over a repository.
    #[must_use]
    pub fn new(repo: Arc<dyn CacheRepository>) -> Self {
        Self { repo }
    }

    /// Returns the payload for the key pair, or a miss.
    ///
    /// An expired row is treated as a miss and opportunistically deleted; a
    /// concurrent delete of the same row is tolerated silently. A payload
    /// that no longer decodes is also a miss, never an error.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Storage` if the repository read fails.
    pub async fn get<T>(
        &self,
        account_id: AccountId,
        cache_key: &str,
    ) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let Some(row) = self.repo.fetch(account_id, cache_key).await? else {
            return Ok(None);
        };

        if row.is_expired(Utc::now()) {
            // Lazy expiry. Losing the delete race to a sweeper or another
            // reader leaves the same end state, so failures only get a log.
            if let Err(error) = self.repo.delete(account_id, cache_key).await {
                tracing::debug!(%account_id, cache_key, %error, "lazy expiry delete failed");
            }
            return Ok(None);
        }

        Ok(decode(&row))
    }

    /// Upserts the payload with `expires_at = now + ttl`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Serialization` if the value cannot be encoded,
    /// or `CacheError::Storage` if the repository write fails.
    pub async fn set<T>(
        &self,
        account_id: AccountId,
        cache_key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let payload = serde_json::to_string(value).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

        let now = Utc::now();
        self.repo
            .upsert(CacheRow {
                account_id,
                cache_key: cache_key.to_string(),
                payload,
                expires_at: now + ttl,
                created_at: now,
                updated_at: now,
            })
            .await
    }

    /// Deletes one entry, or every entry for the account when `cache_key` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Storage` if the repository delete fails.
    pub async fn invalidate(
        &self,
        account_id: AccountId,
        cache_key: Option<&str>,
    ) -> Result<(), CacheError> {
        match cache_key {
            Some(key) => self.repo.delete(account_id, key).await,
            None => self.repo.delete_for_account(account_id).await.map(|_| ()),
        }
    }

    /// Bulk-deletes all expired rows; returns the count removed.
    ///
    /// Intended to be driven by an external scheduler; the store never
    /// triggers this itself.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Storage` if the repository delete fails.
    pub async fn cleanup_expired(&self) -> Result<u64, CacheError> {
        self.repo.delete_expired(Utc::now()).await
    }

    /// Lists all persisted rows for an account, fresh or stale.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Storage` if the repository read fails.
    pub async fn entries(&self, account_id: AccountId) -> Result<Vec<CacheRow>, CacheError> {
        self.repo.list_for_account(account_id).await
    }

    /// Returns the cached payload, fetching and storing it on a miss.
    ///
    /// There is no single-flight de-duplication: two callers that both
    /// observe a cold key will both invoke `fetch`, and the later `set`
    /// wins. This matches the store's eventual-consistency contract.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unmodified, or a `CacheError` (converted
    /// through `E`) if storage fails.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        account_id: AccountId,
        cache_key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(account_id, cache_key).await? {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.set(account_id, cache_key, &value, ttl).await?;
        Ok(value)
    }

    /// Returns the cached payload immediately, refreshing expired entries in
    /// the background.
    ///
    /// - Fresh entry: returned as-is, no extra work.
    /// - Expired entry: the stale payload is returned right away together
    ///   with the handle of a detached refresh task; the caller is never
    ///   blocked by the refresh, and a refresh failure is only logged.
    /// - Absent (or undecodable) entry: fetched synchronously and stored.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unmodified (synchronous path only), or a
    /// `CacheError` (converted through `E`) if storage fails.
    pub async fn get_with_background_refresh<T, E, F, Fut>(
        &self,
        account_id: AccountId,
        cache_key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<CacheRead<T>, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        E: From<CacheError> + fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let row = self
            .repo
            .fetch(account_id, cache_key)
            .await
            .map_err(E::from)?;

        if let Some(row) = row {
            if !row.is_expired(Utc::now()) {
                if let Some(data) = decode(&row) {
                    return Ok(CacheRead {
                        data,
                        is_stale: false,
                        refresh: None,
                    });
                }
            } else if let Some(data) = decode(&row) {
                let store = self.clone();
                let key = cache_key.to_string();
                let handle = tokio::spawn(async move {
                    match fetch().await {
                        Ok(value) => {
                            if let Err(error) = store.set(account_id, &key, &value, ttl).await {
                                tracing::warn!(
                                    %account_id,
                                    cache_key = %key,
                                    %error,
                                    "storing background-refreshed cache entry failed"
                                );
                            }
                        }
                        Err(error) => {
                            tracing::warn!(
                                %account_id,
                                cache_key = %key,
                                %error,
                                "background cache refresh failed"
                            );
                        }
                    }
                });

                return Ok(CacheRead {
                    data,
                    is_stale: true,
                    refresh: Some(handle),
                });
            }
        }

        let data = fetch().await?;
        self.set(account_id, cache_key, &data, ttl).await?;
        Ok(CacheRead {
            data,
            is_stale: false,
            refresh: None,
        })
    }
}

/// Decodes a row's payload, converting decode failures into misses.
fn decode<T: DeserializeOwned>(row: &CacheRow) -> Option<T> {
    match serde_json::from_str(&row.payload) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(
                account_id = %row.account_id,
                cache_key = %row.cache_key,
                %error,
                "undecodable cache payload treated as a miss"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryCacheRepository;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Snapshot {
        issues: Vec<String>,
    }

    fn snapshot(label: &str) -> Snapshot {
        Snapshot {
            issues: vec![label.to_string()],
        }
    }

    fn store() -> (CacheStore, Arc<MemoryCacheRepository>) {
        let repo = Arc::new(MemoryCacheRepository::new());
        (CacheStore::new(repo.clone()), repo)
    }

    async fn seed(
        repo: &MemoryCacheRepository,
        account_id: AccountId,
        key: &str,
        payload: &str,
        expires_in_secs: i64,
    ) {
        let now = Utc::now();
        repo.upsert(CacheRow {
            account_id,
            cache_key: key.to_string(),
            payload: payload.to_string(),
            expires_at: now + Duration::seconds(expires_in_secs),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let (store, _repo) = store();
        let account_id = AccountId::new();

        store
            .set(account_id, "issues", &snapshot("one"), Duration::seconds(60))
            .await
            .unwrap();

        let got: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        assert_eq!(got, Some(snapshot("one")));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_gets_deleted() {
        let (store, repo) = store();
        let account_id = AccountId::new();
        seed(&repo, account_id, "issues", r#"{"issues":["old"]}"#, -10).await;

        let got: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        assert!(got.is_none());
        assert!(repo.fetch(account_id, "issues").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn double_set_keeps_one_row_with_latest_expiry() {
        let (store, repo) = store();
        let account_id = AccountId::new();

        store
            .set(account_id, "issues", &snapshot("one"), Duration::seconds(60))
            .await
            .unwrap();
        store
            .set(account_id, "issues", &snapshot("two"), Duration::seconds(600))
            .await
            .unwrap();

        let rows = repo.list_for_account(account_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].expires_at > Utc::now() + Duration::seconds(100));

        let got: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        assert_eq!(got, Some(snapshot("two")));
    }

    #[tokio::test]
    async fn invalidate_single_key() {
        let (store, _repo) = store();
        let account_id = AccountId::new();

        store
            .set(account_id, "issues", &snapshot("one"), Duration::seconds(60))
            .await
            .unwrap();
        store
            .set(account_id, "repos", &snapshot("two"), Duration::seconds(60))
            .await
            .unwrap();

        store.invalidate(account_id, Some("issues")).await.unwrap();

        let issues: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        let repos: Option<Snapshot> = store.get(account_id, "repos").await.unwrap();
        assert!(issues.is_none());
        assert!(repos.is_some());
    }

    #[tokio::test]
    async fn invalidate_whole_account() {
        let (store, _repo) = store();
        let account_id = AccountId::new();

        store
            .set(account_id, "issues", &snapshot("one"), Duration::seconds(60))
            .await
            .unwrap();
        store
            .set(account_id, "repos", &snapshot("two"), Duration::seconds(60))
            .await
            .unwrap();

        store.invalidate(account_id, None).await.unwrap();

        assert!(store.entries(account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_expired_returns_count() {
        let (store, repo) = store();
        let account_id = AccountId::new();
        seed(&repo, account_id, "old-a", "{}", -10).await;
        seed(&repo, account_id, "old-b", "{}", -10).await;
        seed(&repo, account_id, "fresh", "{}", 60).await;

        let removed = store.cleanup_expired().await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn get_or_fetch_invokes_fetcher_once_per_miss() {
        let (store, _repo) = store();
        let account_id = AccountId::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let got: Result<Snapshot, CacheError> = store
                .get_or_fetch(account_id, "issues", Duration::seconds(60), move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(snapshot("fetched")) }
                })
                .await;
            assert_eq!(got.unwrap(), snapshot("fetched"));
        }

        // First call misses and fetches; second call hits.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_fetch_propagates_fetcher_error() {
        let (store, _repo) = store();
        let account_id = AccountId::new();

        let got: Result<Snapshot, CacheError> = store
            .get_or_fetch(account_id, "issues", Duration::seconds(60), || async {
                Err(CacheError::Storage {
                    reason: "backend down".to_string(),
                })
            })
            .await;

        assert!(matches!(got, Err(CacheError::Storage { .. })));
        let cached: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn background_refresh_fresh_entry_does_no_work() {
        let (store, _repo) = store();
        let account_id = AccountId::new();
        let calls = Arc::new(AtomicUsize::new(0));

        store
            .set(account_id, "issues", &snapshot("fresh"), Duration::seconds(60))
            .await
            .unwrap();

        let fetch_calls = calls.clone();
        let read: Result<CacheRead<Snapshot>, CacheError> = store
            .get_with_background_refresh(account_id, "issues", Duration::seconds(60), move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(snapshot("must-not-run")) }
            })
            .await;
        let read = read.unwrap();

        assert_eq!(read.data, snapshot("fresh"));
        assert!(!read.is_stale);
        assert!(read.refresh.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn background_refresh_absent_entry_fetches_synchronously() {
        let (store, _repo) = store();
        let account_id = AccountId::new();

        let read: Result<CacheRead<Snapshot>, CacheError> = store
            .get_with_background_refresh(account_id, "issues", Duration::seconds(60), || async {
                Ok(snapshot("fetched"))
            })
            .await;
        let read = read.unwrap();

        assert_eq!(read.data, snapshot("fetched"));
        assert!(!read.is_stale);
        assert!(read.refresh.is_none());

        let cached: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        assert_eq!(cached, Some(snapshot("fetched")));
    }

    #[tokio::test]
    async fn background_refresh_serves_stale_then_replaces() {
        let (store, repo) = store();
        let account_id = AccountId::new();
        seed(&repo, account_id, "issues", r#"{"issues":["old"]}"#, -10).await;

        let read: Result<CacheRead<Snapshot>, CacheError> = store
            .get_with_background_refresh(account_id, "issues", Duration::seconds(60), || async {
                Ok(snapshot("new"))
            })
            .await;
        let read = read.unwrap();

        assert_eq!(read.data, snapshot("old"));
        assert!(read.is_stale);

        read.refresh.expect("refresh handle").await.unwrap();

        let cached: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        assert_eq!(cached, Some(snapshot("new")));
    }

    #[tokio::test]
    async fn background_refresh_failure_keeps_stale_row() {
        let (store, repo) = store();
        let account_id = AccountId::new();
        seed(&repo, account_id, "issues", r#"{"issues":["old"]}"#, -10).await;

        let read: Result<CacheRead<Snapshot>, CacheError> = store
            .get_with_background_refresh(account_id, "issues", Duration::seconds(60), || async {
                Err(CacheError::Storage {
                    reason: "provider down".to_string(),
                })
            })
            .await;
        let read = read.unwrap();

        assert_eq!(read.data, snapshot("old"));
        assert!(read.is_stale);

        read.refresh.expect("refresh handle").await.unwrap();

        // The stale row survives for the next read to retry.
        let row = repo
            .fetch(account_id, "issues")
            .await
            .unwrap()
            .expect("row");
        assert_eq!(row.payload, r#"{"issues":["old"]}"#);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_miss() {
        let (store, repo) = store();
        let account_id = AccountId::new();
        seed(&repo, account_id, "issues", "definitely not json", 60).await;

        let got: Option<Snapshot> = store.get(account_id, "issues").await.unwrap();
        assert!(got.is_none());
    }

    // The "acme" timeline: a snapshot written with a 900s TTL is served fresh
    // before expiry without touching the fetcher, served stale just after
    // expiry, and replaced once the background refresh settles.
    #[tokio::test]
    async fn acme_snapshot_lifecycle() {
        let (store, repo) = store();
        let account_id = AccountId::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // t = 800s of a 900s TTL: still fresh.
        seed(&repo, account_id, "acme:issues", r#"{"issues":["t0"]}"#, 100).await;
        let fresh: Option<Snapshot> = store.get(account_id, "acme:issues").await.unwrap();
        assert_eq!(fresh, Some(snapshot("t0")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // t = 950s: expired. The t=0 snapshot comes back immediately.
        seed(&repo, account_id, "acme:issues", r#"{"issues":["t0"]}"#, -50).await;
        let stale_calls = calls.clone();
        let read: Result<CacheRead<Snapshot>, CacheError> = store
            .get_with_background_refresh(
                account_id,
                "acme:issues",
                Duration::seconds(900),
                move || {
                    stale_calls.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(snapshot("t950")) }
                },
            )
            .await;
        let read = read.unwrap();
        assert_eq!(read.data, snapshot("t0"));
        assert!(read.is_stale);

        // Once the refresh settles, a plain get sees the new snapshot.
        read.refresh.expect("refresh handle").await.unwrap();
        let after: Option<Snapshot> = store.get(account_id, "acme:issues").await.unwrap();
        assert_eq!(after, Some(snapshot("t950")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
