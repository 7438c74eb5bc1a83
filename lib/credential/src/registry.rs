//! Broker registry: one broker per account, created on first use.
//!
//! This registry is the single map from `AccountId` to broker instance; no
//! closure or module state holds tokens anywhere else. Brokers are never
//! evicted; they live as long as the registry (normally the process).

use crate::broker::CredentialBroker;
use crate::error::BrokerError;
use crate::provider::ProviderTokenSpec;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::token::TokenClient;
use amber_relay_account::{Account, AccountStore, ConfigCipher};
use amber_relay_core::AccountId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of per-account credential brokers.
pub struct BrokerRegistry {
    accounts: Arc<dyn AccountStore>,
    cipher: Arc<dyn ConfigCipher>,
    tokens: Arc<dyn TokenClient>,
    specs: HashMap<String, ProviderTokenSpec>,
    rate_limit: RateLimitConfig,
    brokers: RwLock<HashMap<AccountId, Arc<CredentialBroker>>>,
}

impl BrokerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        cipher: Arc<dyn ConfigCipher>,
        tokens: Arc<dyn TokenClient>,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            accounts,
            cipher,
            tokens,
            specs: HashMap::new(),
            rate_limit,
            brokers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the token endpoint spec for a connector type.
    pub fn register_provider(
        &mut self,
        connector_type: impl Into<String>,
        spec: ProviderTokenSpec,
    ) {
        self.specs.insert(connector_type.into(), spec);
    }

    /// Returns the broker for an account, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` when no provider spec is registered for
    /// the account's connector type.
    pub fn broker_for(&self, account: &Account) -> Result<Arc<CredentialBroker>, BrokerError> {
        if let Some(existing) = self.brokers.read().unwrap().get(&account.id) {
            return Ok(Arc::clone(existing));
        }

        let spec = self
            .specs
            .get(&account.connector_type)
            .cloned()
            .ok_or_else(|| BrokerError::Config {
                reason: format!(
                    "no provider token spec registered for connector type '{}'",
                    account.connector_type
                ),
            })?;

        let broker = Arc::new(CredentialBroker::new(
            account.id,
            spec,
            Arc::clone(&self.accounts),
            Arc::clone(&self.cipher),
            Arc::clone(&self.tokens),
            RateLimiter::new(self.rate_limit.clone()),
        )?);

        // Two racing callers both build a broker; the first insert wins so
        // every caller shares one token cache per account.
        let mut brokers = self.brokers.write().unwrap();
        let entry = brokers
            .entry(account.id)
            .or_insert_with(|| Arc::clone(&broker));
        Ok(Arc::clone(entry))
    }
}
