//! Cache preloading for the amber-relay platform.
//!
//! This crate provides:
//!
//! - **PreloadRegistry**: The declarative extension point mapping a
//!   connector type to its `{cache_key, ttl, fetcher}` triples
//! - **PreloadOrchestrator**: Warms the cache for every enabled account
//!   ahead of interactive use, sequential within an account and parallel
//!   across accounts
//! - **Cache status**: A read-only diagnostic joining persisted cache rows
//!   against the registered keys
//!
//! Connector implementations plug in through `PreloadFetcher` without the
//! orchestrator knowing any provider specifics. Preload is best-effort and
//! silent beyond logs; only the interactive `test_connection` path surfaces
//! raw error text.

pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod status;

pub use error::FetchError;
pub use orchestrator::{PreloadOrchestrator, PreloadOutcome, PreloadStatus};
pub use registry::{PreloadEntry, PreloadFetcher, PreloadRegistry};
pub use status::{CacheFreshness, CacheKeyStatus};
