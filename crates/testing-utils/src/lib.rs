//! # Relay Testing Utils
//!
//! Shared testing utilities for the egress relay workspace: deterministic
//! clock and random sources, in-memory audit sinks and small builders.
//!
//! ```toml
//! [dev-dependencies]
//! relay-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use helpers::*;
pub use mocks::*;
