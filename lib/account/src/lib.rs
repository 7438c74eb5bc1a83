//! External account records for the amber-relay platform.
//!
//! This crate provides:
//!
//! - **Account model**: One configured external integration (issue tracker,
//!   code host, mailbox, cloud console) with its encrypted configuration blob
//! - **Account store**: Persistence trait with Postgres and in-memory backends
//! - **Config cipher**: Seam for the platform's at-rest encryption primitive

pub mod account;
pub mod cipher;
pub mod error;
pub mod pg;
pub mod store;

pub use account::{Account, AccountStatus};
pub use cipher::{ConfigCipher, PlaintextCipher};
pub use error::AccountError;
pub use pg::PgAccountStore;
pub use store::{AccountStore, InMemoryAccountStore};
