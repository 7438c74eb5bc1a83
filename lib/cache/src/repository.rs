//! Cache persistence trait and in-memory implementation.
//!
//! The persistence engine is external to this layer; all the store needs is
//! keyed upsert, delete, and range-scan by expiry. The in-memory
//! implementation backs tests and local development.

use crate::entry::CacheRow;
use crate::error::CacheError;
use amber_relay_core::AccountId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Trait for cache row persistence.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Fetches a row by key pair.
    async fn fetch(
        &self,
        account_id: AccountId,
        cache_key: &str,
    ) -> Result<Option<CacheRow>, CacheError>;

    /// Inserts or replaces the row for the key pair.
    ///
    /// On replace, `created_at` of the existing row is preserved.
    async fn upsert(&self, row: CacheRow) -> Result<(), CacheError>;

    /// Deletes a row. Deleting an absent row is not an error.
    async fn delete(&self, account_id: AccountId, cache_key: &str) -> Result<(), CacheError>;

    /// Deletes all rows for an account; returns the count removed.
    async fn delete_for_account(&self, account_id: AccountId) -> Result<u64, CacheError>;

    /// Deletes all rows with `expires_at` before the cutoff; returns the
    /// count removed.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError>;

    /// Lists all rows for an account.
    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<CacheRow>, CacheError>;
}

/// In-memory cache repository for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryCacheRepository {
    rows: Arc<RwLock<HashMap<(AccountId, String), CacheRow>>>,
}

impl MemoryCacheRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheRepository for MemoryCacheRepository {
    async fn fetch(
        &self,
        account_id: AccountId,
        cache_key: &str,
    ) -> Result<Option<CacheRow>, CacheError> {
        let rows = self.rows.read().unwrap();
        Ok(rows.get(&(account_id, cache_key.to_string())).cloned())
    }

    async fn upsert(&self, mut row: CacheRow) -> Result<(), CacheError> {
        let mut rows = self.rows.write().unwrap();
        let key = (row.account_id, row.cache_key.clone());
        if let Some(existing) = rows.get(&key) {
            row.created_at = existing.created_at;
        }
        rows.insert(key, row);
        Ok(())
    }

    async fn delete(&self, account_id: AccountId, cache_key: &str) -> Result<(), CacheError> {
        let mut rows = self.rows.write().unwrap();
        rows.remove(&(account_id, cache_key.to_string()));
        Ok(())
    }

    async fn delete_for_account(&self, account_id: AccountId) -> Result<u64, CacheError> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|(id, _), _| *id != account_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|_, row| row.expires_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<CacheRow>, CacheError> {
        let rows = self.rows.read().unwrap();
        let mut result: Vec<CacheRow> = rows
            .values()
            .filter(|row| row.account_id == account_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.cache_key.cmp(&b.cache_key));
        Ok(result)
    }
}
