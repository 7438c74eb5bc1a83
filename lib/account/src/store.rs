//! Account storage trait and in-memory implementation.
//!
//! The persistence engine is external to this layer; `AccountStore` is the
//! seam it plugs into. The in-memory implementation backs tests and local
//! development without a database.

use crate::account::{Account, AccountStatus};
use crate::error::AccountError;
use amber_relay_core::AccountId;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Trait for account storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates an account record.
    async fn create(&self, account: &Account) -> Result<(), AccountError>;

    /// Finds an account by ID.
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError>;

    /// Lists all enabled accounts, ordered by name.
    async fn list_enabled(&self) -> Result<Vec<Account>, AccountError>;

    /// Replaces an account's encrypted config blob.
    ///
    /// Used by the credential broker when a provider rotates the refresh
    /// token; the whole blob is written back in one operation.
    async fn update_config_blob(&self, id: AccountId, blob: Vec<u8>) -> Result<(), AccountError>;

    /// Updates an account's connection status.
    async fn set_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        error_message: Option<String>,
    ) -> Result<(), AccountError>;

    /// Deletes an account.
    async fn delete(&self, id: AccountId) -> Result<(), AccountError>;
}

/// In-memory account store for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
}

impl InMemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create(&self, account: &Account) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().unwrap();
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.get(&id).cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<Account>, AccountError> {
        let accounts = self.accounts.read().unwrap();
        let mut enabled: Vec<Account> = accounts.values().filter(|a| a.enabled).cloned().collect();
        enabled.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(enabled)
    }

    async fn update_config_blob(&self, id: AccountId, blob: Vec<u8>) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .get_mut(&id)
            .ok_or(AccountError::NotFound { id })?;
        account.config_blob = blob;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn set_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        error_message: Option<String>,
    ) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .get_mut(&id)
            .ok_or(AccountError::NotFound { id })?;
        account.status = status;
        account.error_message = error_message;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: AccountId) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().unwrap();
        accounts.remove(&id);
        Ok(())
    }
}
