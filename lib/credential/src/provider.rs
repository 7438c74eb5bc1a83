//! Per-provider token endpoint configuration.
//!
//! One generic broker serves every OAuth provider; everything
//! provider-specific is data in a `ProviderTokenSpec`. A new provider is a
//! new spec value, not a new type.

use crate::error::BrokerError;
use amber_relay_account::Account;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// How client credentials travel to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStyle {
    /// `client_id`/`client_secret` as form fields in the request body.
    Body,
    /// HTTP Basic authorization header.
    BasicHeader,
}

/// Resolves the token endpoint URL for an account.
///
/// Most providers use one static URL; some resolve a tenant-specific host
/// from the account's decrypted config.
pub trait TokenUrlResolver: Send + Sync {
    /// Returns the token endpoint URL for this account.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the account config lacks the fields
    /// the resolver needs.
    fn resolve(&self, account: &Account, config: &JsonValue) -> Result<String, BrokerError>;
}

/// A fixed token endpoint URL.
pub struct StaticTokenUrl(pub String);

impl TokenUrlResolver for StaticTokenUrl {
    fn resolve(&self, _account: &Account, _config: &JsonValue) -> Result<String, BrokerError> {
        Ok(self.0.clone())
    }
}

/// A token endpoint URL templated from one field of the account config.
///
/// The template's `{}` placeholder is replaced with the config field's value,
/// e.g. `https://{}.example.com/oauth/token` with field `tenant`.
pub struct ConfigFieldTokenUrl {
    /// Config field holding the per-account value.
    pub field: String,
    /// URL template containing a single `{}` placeholder.
    pub template: String,
}

impl TokenUrlResolver for ConfigFieldTokenUrl {
    fn resolve(&self, account: &Account, config: &JsonValue) -> Result<String, BrokerError> {
        let value = config
            .get(&self.field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BrokerError::Config {
                reason: format!(
                    "account '{}' config is missing field '{}' for token URL resolution",
                    account.name, self.field
                ),
            })?;

        Ok(self.template.replace("{}", value))
    }
}

/// Everything provider-specific the broker needs to refresh a token.
#[derive(Clone)]
pub struct ProviderTokenSpec {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// How client credentials travel to the token endpoint.
    pub auth_style: AuthStyle,
    /// Token endpoint resolution.
    pub token_url: Arc<dyn TokenUrlResolver>,
    /// Provider-specific extra form parameters sent with every refresh
    /// (e.g. a mandatory `scope`).
    pub extra_refresh_params: Vec<(String, String)>,
}

impl ProviderTokenSpec {
    /// Creates a spec with a static token URL, body-style credentials, and
    /// no extra parameters.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_style: AuthStyle::Body,
            token_url: Arc::new(StaticTokenUrl(token_url.into())),
            extra_refresh_params: Vec::new(),
        }
    }

    /// Switches to HTTP Basic credential transmission.
    #[must_use]
    pub fn with_basic_auth(mut self) -> Self {
        self.auth_style = AuthStyle::BasicHeader;
        self
    }

    /// Adds an extra refresh parameter.
    #[must_use]
    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_refresh_params.push((key.into(), value.into()));
        self
    }

    /// Replaces the token URL resolver.
    #[must_use]
    pub fn with_token_url_resolver(mut self, resolver: Arc<dyn TokenUrlResolver>) -> Self {
        self.token_url = resolver;
        self
    }
}
