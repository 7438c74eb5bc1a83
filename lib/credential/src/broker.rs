//! The credential broker: one account's OAuth token lifecycle.
//!
//! Token states: no token → (refresh ok) → valid until expiry → (now inside
//! the refresh buffer) → needs refresh → (refresh ok) → valid again. A
//! refresh failure with no stored refresh token is terminal
//! (`AuthorizationRequired`); a transient network failure leaves the prior
//! state in place and the next call retries.
//!
//! Access tokens are never persisted. Refresh tokens live inside the
//! account's encrypted config blob; on rotation the broker patches exactly
//! that field and writes the whole blob back.

use crate::error::BrokerError;
use crate::provider::ProviderTokenSpec;
use crate::rate_limit::{RateLimitResult, RateLimiter};
use crate::token::{RefreshRequest, TokenClient};
use amber_relay_account::{Account, AccountError, AccountStore, ConfigCipher};
use amber_relay_core::AccountId;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;

/// Refresh this many seconds before the provider-reported expiry.
const REFRESH_BUFFER_SECS: i64 = 60;

/// Token lifetime assumed when a provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Timeout applied to authenticated provider calls made through the broker's
/// own client.
const EXECUTE_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// The in-memory credential for one account.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Broker for one account's OAuth credentials.
///
/// Instances are per-account; the token cache must never be shared across
/// accounts. Create brokers through a `BrokerRegistry`.
pub struct CredentialBroker {
    account_id: AccountId,
    spec: ProviderTokenSpec,
    accounts: Arc<dyn AccountStore>,
    cipher: Arc<dyn ConfigCipher>,
    tokens: Arc<dyn TokenClient>,
    limiter: RateLimiter,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl CredentialBroker {
    /// Creates a broker for one account.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the HTTP client cannot be built.
    pub fn new(
        account_id: AccountId,
        spec: ProviderTokenSpec,
        accounts: Arc<dyn AccountStore>,
        cipher: Arc<dyn ConfigCipher>,
        tokens: Arc<dyn TokenClient>,
        limiter: RateLimiter,
    ) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .timeout(EXECUTE_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::Config {
                reason: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            account_id,
            spec,
            accounts,
            cipher,
            tokens,
            limiter,
            http,
            cached: RwLock::new(None),
        })
    }

    /// Returns the account this broker serves.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Builds a request against the broker's HTTP client.
    ///
    /// Pass the result to [`execute`](Self::execute) after adding path,
    /// query, and body.
    pub fn request(&self, method: reqwest::Method, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Returns a valid bearer token, refreshing when needed.
    ///
    /// The cached token is reused while `now < expiry - 60s`; inside that
    /// buffer a refresh runs first. Refresh holds no exclusive lock: two
    /// concurrent callers that both observe an expired token will both
    /// refresh. Provider refresh grants are idempotent, so the second result
    /// simply overwrites the first.
    ///
    /// # Errors
    ///
    /// Returns `AuthorizationRequired` when no refresh token is on file,
    /// `Provider`/`TransientNetwork` when the refresh call fails.
    pub async fn access_token(&self) -> Result<String, BrokerError> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if Utc::now() < token.expires_at - Duration::seconds(REFRESH_BUFFER_SECS) {
                return Ok(token.access_token.clone());
            }
        }

        self.refresh().await
    }

    /// Runs a refresh grant and caches the result.
    ///
    /// On a rotated refresh token the account's config blob is re-encrypted
    /// with only the `refresh_token` field changed; every other field
    /// round-trips untouched.
    ///
    /// # Errors
    ///
    /// Returns `AuthorizationRequired` when the config holds no refresh
    /// token, `Config`/`Storage` for account problems, and the token
    /// client's errors unmodified.
    pub async fn refresh(&self) -> Result<String, BrokerError> {
        let account = self.load_account().await?;
        let mut config = account
            .decrypt_config(self.cipher.as_ref())
            .map_err(map_account_error)?;

        let refresh_token = config
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(BrokerError::AuthorizationRequired {
                account_id: self.account_id,
            })?
            .to_string();

        let token_url = self.spec.token_url.resolve(&account, &config)?;

        let grant = self
            .tokens
            .refresh(&RefreshRequest {
                token_url,
                client_id: self.spec.client_id.clone(),
                client_secret: self.spec.client_secret.clone(),
                refresh_token: refresh_token.clone(),
                auth_style: self.spec.auth_style,
                extra_params: self.spec.extra_refresh_params.clone(),
            })
            .await?;

        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = Utc::now() + Duration::seconds(expires_in as i64);

        {
            let mut cached = self.cached.write().await;
            *cached = Some(CachedToken {
                access_token: grant.access_token.clone(),
                expires_at,
            });
        }

        if let Some(rotated) = grant.refresh_token.as_deref() {
            if rotated != refresh_token {
                config["refresh_token"] = JsonValue::String(rotated.to_string());
                let blob = Account::encrypt_config(self.cipher.as_ref(), &config)
                    .map_err(map_account_error)?;
                self.accounts
                    .update_config_blob(self.account_id, blob)
                    .await
                    .map_err(map_account_error)?;
                tracing::info!(account_id = %self.account_id, "persisted rotated refresh token");
            }
        }

        tracing::debug!(
            account_id = %self.account_id,
            expires_at = %expires_at,
            "refreshed access token"
        );

        Ok(grant.access_token)
    }

    /// Executes an authenticated request.
    ///
    /// Injects the bearer header and performs the call. Build the request
    /// with [`request`](Self::request) or any `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` when the account's budget is exhausted,
    /// `Provider { status, body }` for a non-2xx reply, and
    /// `TransientNetwork` for transport failures.
    pub async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BrokerError> {
        if let RateLimitResult::Exceeded { retry_after_secs } =
            self.limiter.check_and_increment(self.account_id)
        {
            return Err(BrokerError::RateLimited { retry_after_secs });
        }

        let token = self.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BrokerError::TransientNetwork {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn load_account(&self) -> Result<Account, BrokerError> {
        self.accounts
            .find_by_id(self.account_id)
            .await
            .map_err(map_account_error)?
            .ok_or_else(|| BrokerError::Storage {
                reason: format!("account {} no longer exists", self.account_id),
            })
    }
}

fn map_account_error(error: AccountError) -> BrokerError {
    match error {
        AccountError::Cipher { reason } | AccountError::InvalidConfig { reason } => {
            BrokerError::Config { reason }
        }
        AccountError::NotFound { id } => BrokerError::Storage {
            reason: format!("account {id} not found"),
        },
        AccountError::Storage { reason } => BrokerError::Storage { reason },
    }
}
