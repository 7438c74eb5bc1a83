//! Error types for the credential crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `BrokerError`: Errors from token brokering and authenticated execution
//!
//! The variants separate "needs a human" from "retry later": callers route
//! `AuthorizationRequired` to the account owner and may retry
//! `TransientNetwork` themselves.

use amber_relay_core::AccountId;
use std::fmt;

/// Errors from credential broker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// No usable refresh token on file; a human must re-authorize the
    /// account. Not retryable.
    AuthorizationRequired { account_id: AccountId },
    /// The provider answered with a non-2xx status.
    Provider { status: u16, body: String },
    /// Transport-level failure. Retryable.
    TransientNetwork { reason: String },
    /// The per-account request budget is exhausted.
    RateLimited { retry_after_secs: u64 },
    /// The persisted account config blob is missing or malformed.
    Config { reason: String },
    /// The account store failed.
    Storage { reason: String },
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationRequired { account_id } => {
                write!(f, "account {account_id} requires re-authorization")
            }
            Self::Provider { status, body } => {
                write!(f, "provider returned status {status}: {body}")
            }
            Self::TransientNetwork { reason } => {
                write!(f, "network failure: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                write!(f, "rate limited, retry after {retry_after_secs}s")
            }
            Self::Config { reason } => {
                write!(f, "invalid account config: {reason}")
            }
            Self::Storage { reason } => {
                write!(f, "account storage operation failed: {reason}")
            }
        }
    }
}

impl std::error::Error for BrokerError {}

impl BrokerError {
    /// Returns true when retrying the same call later could succeed without
    /// human intervention.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork { .. } | Self::RateLimited { .. }
        )
    }
}
