//! Error types for the account crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AccountError`: Errors from account storage, lookup, and config handling

use amber_relay_core::AccountId;
use std::fmt;

/// Errors from account operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Account not found.
    NotFound { id: AccountId },
    /// Storage operation failed.
    Storage { reason: String },
    /// Encryption or decryption of the config blob failed.
    Cipher { reason: String },
    /// The decrypted config blob is not valid JSON or is missing fields.
    InvalidConfig { reason: String },
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => {
                write!(f, "account not found: {id}")
            }
            Self::Storage { reason } => {
                write!(f, "account storage operation failed: {reason}")
            }
            Self::Cipher { reason } => {
                write!(f, "config cipher operation failed: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid account config: {reason}")
            }
        }
    }
}

impl std::error::Error for AccountError {}
