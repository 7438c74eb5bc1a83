//! Fan-out execution for the amber-relay platform.
//!
//! This crate provides:
//!
//! - **FanOutRouter**: Runs one function against N independent branches
//!   concurrently, isolating each branch's failure
//! - **Merge helpers**: Combine per-branch result lists into one list with
//!   per-item provenance and natural-key de-duplication
//!
//! A branch is one unit of parallel work: a distinct account during preload,
//! or one instance of a multi-site connector during a fanned-out query. An
//! unhealthy branch only ever costs its own results.

pub mod branch;
pub mod merge;
pub mod router;

pub use branch::{Branch, BranchResult};
pub use merge::{Provenanced, merge_by_key};
pub use router::FanOutRouter;
