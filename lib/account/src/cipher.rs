//! Config cipher seam.
//!
//! The platform's at-rest encryption primitive lives outside this layer; all
//! amber-relay needs is an opaque encrypt/decrypt-to-blob pair. Production
//! wires the real primitive in through this trait.

use crate::error::AccountError;

/// Trait for the at-rest encryption of account configuration blobs.
pub trait ConfigCipher: Send + Sync {
    /// Encrypts plaintext into an opaque blob.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Cipher` if encryption fails.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, AccountError>;

    /// Decrypts an opaque blob back into plaintext.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Cipher` if the blob is malformed or the key is
    /// wrong.
    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, AccountError>;
}

/// A cipher that stores plaintext unchanged.
///
/// For tests and local development only. Never wire this into a deployment
/// that holds real credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl ConfigCipher for PlaintextCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, AccountError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, AccountError> {
        Ok(blob.to_vec())
    }
}
