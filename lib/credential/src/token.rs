//! Token endpoint client.
//!
//! The provider contract: `POST` with `grant_type=refresh_token` (plus
//! `refresh_token` and any provider-specific extras); the response carries
//! `{access_token, refresh_token?, expires_in, token_type}`. Client
//! credentials travel either as form fields or as an HTTP Basic header.
//!
//! `TokenClient` is a trait so broker tests run without a network.

use crate::error::BrokerError;
use crate::provider::AuthStyle;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Timeout applied to token endpoint calls.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A refresh-grant request against one token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Resolved token endpoint URL.
    pub token_url: String,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// The refresh token currently on file.
    pub refresh_token: String,
    /// How client credentials travel.
    pub auth_style: AuthStyle,
    /// Provider-specific extra form parameters.
    pub extra_params: Vec<(String, String)>,
}

/// A successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    /// The new bearer token.
    pub access_token: String,
    /// A rotated refresh token, if the provider issued one.
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: Option<u64>,
    /// Token type, normally "Bearer".
    pub token_type: Option<String>,
    /// Granted scopes, if the provider reports them.
    pub scope: Option<String>,
}

/// Trait for executing refresh grants.
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Executes a refresh grant.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Provider` for a non-2xx response and
    /// `BrokerError::TransientNetwork` for transport failures.
    async fn refresh(&self, request: &RefreshRequest) -> Result<TokenGrant, BrokerError>;
}

/// HTTP implementation of `TokenClient`.
pub struct HttpTokenClient {
    http: reqwest::Client,
}

impl HttpTokenClient {
    /// Creates a client for token endpoint calls.
    ///
    /// Redirects are disabled: a token endpoint that redirects is
    /// misconfigured, and following one could leak credentials.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Config` if the underlying client cannot be
    /// built.
    pub fn new() -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::Config {
                reason: format!("HTTP client error: {e}"),
            })?;

        Ok(Self { http })
    }
}

#[async_trait]
impl TokenClient for HttpTokenClient {
    async fn refresh(&self, request: &RefreshRequest) -> Result<TokenGrant, BrokerError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", &request.refresh_token),
        ];
        for (key, value) in &request.extra_params {
            params.push((key, value));
        }

        let mut builder = self.http.post(&request.token_url);
        match request.auth_style {
            AuthStyle::Body => {
                params.push(("client_id", &request.client_id));
                params.push(("client_secret", &request.client_secret));
            }
            AuthStyle::BasicHeader => {
                builder = builder.basic_auth(&request.client_id, Some(&request.client_secret));
            }
        }

        let response = builder
            .form(&params)
            .send()
            .await
            .map_err(|e| BrokerError::TransientNetwork {
                reason: format!("token endpoint request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| BrokerError::Provider {
                status: status.as_u16(),
                body: format!("unparseable token response: {e}"),
            })
    }
}
