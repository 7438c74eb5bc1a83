//! Persisted response cache for the amber-relay platform.
//!
//! This crate provides:
//!
//! - **CacheStore**: TTL-bounded cache of serializable payloads scoped per
//!   account, with strict miss-then-fetch and stale-while-revalidate reads
//! - **CacheRepository**: Persistence trait with Postgres and in-memory
//!   backends
//!
//! Rows are independently addressed by `(account_id, cache_key)`; there is no
//! cross-row locking and no multi-key transaction. Consistency is eventual:
//! concurrent writers race benignly and the last upsert wins.

pub mod entry;
pub mod error;
pub mod pg;
pub mod repository;
pub mod store;

pub use entry::CacheRow;
pub use error::CacheError;
pub use pg::PgCacheRepository;
pub use repository::{CacheRepository, MemoryCacheRepository};
pub use store::{CacheRead, CacheStore};
