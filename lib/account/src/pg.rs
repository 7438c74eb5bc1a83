//! Postgres-backed account store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE accounts (
//!     id TEXT PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     connector_type TEXT NOT NULL,
//!     enabled BOOLEAN NOT NULL,
//!     status TEXT NOT NULL,
//!     error_message TEXT,
//!     config_blob TEXT NOT NULL,       -- base64 of the encrypted blob
//!     created_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL,
//!     last_used_at TIMESTAMPTZ
//! );
//! ```

use crate::account::{Account, AccountStatus};
use crate::error::AccountError;
use crate::store::AccountStore;
use amber_relay_core::AccountId;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for account queries.
#[derive(FromRow)]
struct AccountRow {
    id: String,
    name: String,
    connector_type: String,
    enabled: bool,
    status: String,
    error_message: Option<String>,
    config_blob: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl AccountRow {
    fn try_into_account(self) -> Result<Account, AccountError> {
        let id = AccountId::from_str(&self.id).map_err(|e| AccountError::Storage {
            reason: format!("invalid account id '{}': {}", self.id, e),
        })?;

        let config_blob = BASE64
            .decode(&self.config_blob)
            .map_err(|e| AccountError::Storage {
                reason: format!("invalid config blob encoding: {e}"),
            })?;

        Ok(Account {
            id,
            name: self.name,
            connector_type: self.connector_type,
            enabled: self.enabled,
            status: AccountStatus::from_str_value(&self.status),
            error_message: self.error_message,
            config_blob,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_used_at: self.last_used_at,
        })
    }
}

/// Postgres repository for account records.
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Creates a new store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn storage_error(e: sqlx::Error) -> AccountError {
        AccountError::Storage {
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, account: &Account) -> Result<(), AccountError> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, name, connector_type, enabled, status, error_message,
                 config_blob, created_at, updated_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.name)
        .bind(&account.connector_type)
        .bind(account.enabled)
        .bind(account.status.as_str())
        .bind(&account.error_message)
        .bind(BASE64.encode(&account.config_blob))
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, name, connector_type, enabled, status, error_message,
                   config_blob, created_at, updated_at, last_used_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        match row {
            Some(r) => Ok(Some(r.try_into_account()?)),
            None => Ok(None),
        }
    }

    async fn list_enabled(&self) -> Result<Vec<Account>, AccountError> {
        let rows: Vec<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, name, connector_type, enabled, status, error_message,
                   config_blob, created_at, updated_at, last_used_at
            FROM accounts
            WHERE enabled = TRUE
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        rows.into_iter().map(|r| r.try_into_account()).collect()
    }

    async fn update_config_blob(&self, id: AccountId, blob: Vec<u8>) -> Result<(), AccountError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET config_blob = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(BASE64.encode(&blob))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound { id });
        }
        Ok(())
    }

    async fn set_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        error_message: Option<String>,
    ) -> Result<(), AccountError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = $2, error_message = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(&error_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound { id });
        }
        Ok(())
    }

    async fn delete(&self, id: AccountId) -> Result<(), AccountError> {
        sqlx::query(
            r#"
            DELETE FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        Ok(())
    }
}
