//! Postgres-backed cache repository.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE response_cache (
//!     account_id TEXT NOT NULL,
//!     cache_key TEXT NOT NULL,
//!     payload TEXT NOT NULL,
//!     expires_at TIMESTAMPTZ NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (account_id, cache_key)
//! );
//! CREATE INDEX idx_response_cache_expires ON response_cache (expires_at);
//! ```

use crate::entry::CacheRow;
use crate::error::CacheError;
use crate::repository::CacheRepository;
use amber_relay_core::AccountId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for cache queries.
#[derive(FromRow)]
struct CacheRowRecord {
    account_id: String,
    cache_key: String,
    payload: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CacheRowRecord {
    fn try_into_row(self) -> Result<CacheRow, CacheError> {
        let account_id = AccountId::from_str(&self.account_id).map_err(|e| CacheError::Storage {
            reason: format!("invalid account id '{}': {}", self.account_id, e),
        })?;

        Ok(CacheRow {
            account_id,
            cache_key: self.cache_key,
            payload: self.payload,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Postgres repository for cache rows.
pub struct PgCacheRepository {
    pool: PgPool,
}

impl PgCacheRepository {
    /// Creates a new repository over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn storage_error(e: sqlx::Error) -> CacheError {
        CacheError::Storage {
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl CacheRepository for PgCacheRepository {
    async fn fetch(
        &self,
        account_id: AccountId,
        cache_key: &str,
    ) -> Result<Option<CacheRow>, CacheError> {
        let record: Option<CacheRowRecord> = sqlx::query_as(
            r#"
            SELECT account_id, cache_key, payload, expires_at, created_at, updated_at
            FROM response_cache
            WHERE account_id = $1 AND cache_key = $2
            "#,
        )
        .bind(account_id.to_string())
        .bind(cache_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        match record {
            Some(r) => Ok(Some(r.try_into_row()?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, row: CacheRow) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            INSERT INTO response_cache
                (account_id, cache_key, payload, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id, cache_key) DO UPDATE
            SET payload = EXCLUDED.payload,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(row.account_id.to_string())
        .bind(&row.cache_key)
        .bind(&row.payload)
        .bind(row.expires_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        Ok(())
    }

    async fn delete(&self, account_id: AccountId, cache_key: &str) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            DELETE FROM response_cache
            WHERE account_id = $1 AND cache_key = $2
            "#,
        )
        .bind(account_id.to_string())
        .bind(cache_key)
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        Ok(())
    }

    async fn delete_for_account(&self, account_id: AccountId) -> Result<u64, CacheError> {
        let result = sqlx::query(
            r#"
            DELETE FROM response_cache
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError> {
        let result = sqlx::query(
            r#"
            DELETE FROM response_cache
            WHERE expires_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        Ok(result.rows_affected())
    }

    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<CacheRow>, CacheError> {
        let records: Vec<CacheRowRecord> = sqlx::query_as(
            r#"
            SELECT account_id, cache_key, payload, expires_at, created_at, updated_at
            FROM response_cache
            WHERE account_id = $1
            ORDER BY cache_key ASC
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        records.into_iter().map(|r| r.try_into_row()).collect()
    }
}
