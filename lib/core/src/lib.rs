//! Core domain types and utilities for the amber-relay integration layer.
//!
//! This crate provides the foundational types, error handling, and shared
//! utilities used throughout amber-relay, the account-integration core that
//! sits between an AI assistant's tool-calling surface and the external
//! services it reaches into.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::AccountId;
