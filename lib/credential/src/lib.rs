//! OAuth credential brokering for the amber-relay platform.
//!
//! This crate provides:
//!
//! - **CredentialBroker**: One account's OAuth token lifecycle, from lazy
//!   acquisition and refresh-before-expiry through rotation persistence and
//!   authenticated request execution
//! - **ProviderTokenSpec**: Per-provider capabilities (token URL resolution,
//!   credential transmission mode, extra refresh parameters) as plain
//!   configuration instead of per-provider subclasses
//! - **BrokerRegistry**: Explicit account-to-broker map with
//!   creation-on-first-use
//! - **RateLimiter**: Per-account request budgeting for provider calls
//!
//! Access tokens live only in process memory; refresh tokens live inside the
//! account's encrypted config blob and are written back on rotation.

pub mod broker;
pub mod error;
pub mod provider;
pub mod rate_limit;
pub mod registry;
pub mod token;

pub use broker::CredentialBroker;
pub use error::BrokerError;
pub use provider::{AuthStyle, ConfigFieldTokenUrl, ProviderTokenSpec, StaticTokenUrl, TokenUrlResolver};
pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use registry::BrokerRegistry;
pub use token::{HttpTokenClient, RefreshRequest, TokenClient, TokenGrant};
