//! Cache row model.

use amber_relay_core::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted cache row.
///
/// At most one row exists per `(account_id, cache_key)` pair; writes are
/// upserts, never appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRow {
    /// The account this entry belongs to.
    pub account_id: AccountId,
    /// Cache key, unique within the account.
    pub cache_key: String,
    /// Serialized payload (JSON text).
    pub payload: String,
    /// When the entry stops being fresh.
    pub expires_at: DateTime<Utc>,
    /// When the entry was first written.
    pub created_at: DateTime<Utc>,
    /// When the entry was last written.
    pub updated_at: DateTime<Utc>,
}

impl CacheRow {
    /// Returns true if the row's TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
