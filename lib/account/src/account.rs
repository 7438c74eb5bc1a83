//! The account model: one configured external integration.
//!
//! An account pairs a connector type (e.g. "issue_tracker", "code_host",
//! "mailbox") with the encrypted configuration blob that connector needs to
//! reach one concrete instance of the service. Everything secret (refresh
//! tokens, client secrets, tenant hostnames) lives inside the blob; this
//! record itself is safe to list and log.

use crate::cipher::ConfigCipher;
use crate::error::AccountError;
use amber_relay_core::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Status of an external account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Successfully connected and working.
    Connected,
    /// Connection failed or credentials invalid.
    Error,
    /// Awaiting OAuth completion or initial connection.
    Pending,
}

impl AccountStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Pending => "pending",
        }
    }

    pub(crate) fn from_str_value(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "error" => Self::Error,
            _ => Self::Pending,
        }
    }
}

/// A configured external account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// User-provided name/label (e.g. "acme", "work-mail").
    pub name: String,
    /// Type of connector (e.g. "issue_tracker", "code_host", "mailbox").
    pub connector_type: String,
    /// Whether this account participates in preload and fan-out queries.
    pub enabled: bool,
    /// Current connection status.
    pub status: AccountStatus,
    /// Error message if status is error.
    pub error_message: Option<String>,
    /// Encrypted configuration blob. Opaque outside the cipher seam.
    #[serde(skip)]
    pub config_blob: Vec<u8>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the account was last successfully used.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Creates a new account with an already-encrypted config blob.
    #[must_use]
    pub fn new(name: String, connector_type: String, config_blob: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            name,
            connector_type,
            enabled: true,
            status: AccountStatus::Pending,
            error_message: None,
            config_blob,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    /// Sets the status to connected.
    pub fn mark_connected(&mut self) {
        self.status = AccountStatus::Connected;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    /// Sets the status to error.
    pub fn mark_error(&mut self, message: String) {
        self.status = AccountStatus::Error;
        self.error_message = Some(message);
        self.updated_at = Utc::now();
    }

    /// Updates the last used timestamp.
    pub fn mark_used(&mut self) {
        self.last_used_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Decrypts and decodes the configuration blob.
    ///
    /// The decoded value is a JSON object; fields this layer does not know
    /// about are preserved as-is so they survive a decode/patch/encode cycle.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Cipher` if decryption fails, or
    /// `AccountError::InvalidConfig` if the plaintext is not a JSON object.
    pub fn decrypt_config(&self, cipher: &dyn ConfigCipher) -> Result<JsonValue, AccountError> {
        let plaintext = cipher.decrypt(&self.config_blob)?;
        let value: JsonValue =
            serde_json::from_slice(&plaintext).map_err(|e| AccountError::InvalidConfig {
                reason: e.to_string(),
            })?;
        if !value.is_object() {
            return Err(AccountError::InvalidConfig {
                reason: "config blob is not a JSON object".to_string(),
            });
        }
        Ok(value)
    }

    /// Encodes and encrypts a configuration value into a blob.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Cipher` if encryption fails.
    pub fn encrypt_config(
        cipher: &dyn ConfigCipher,
        config: &JsonValue,
    ) -> Result<Vec<u8>, AccountError> {
        let plaintext = serde_json::to_vec(config).map_err(|e| AccountError::InvalidConfig {
            reason: e.to_string(),
        })?;
        cipher.encrypt(&plaintext)
    }
}
