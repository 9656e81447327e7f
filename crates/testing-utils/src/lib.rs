//! # Batchsync Testing Utils
//!
//! Shared testing utilities for the sync scheduler workspace: builders with sensible defaults
//! for definitions and jobs, plus time helpers.
//!
//! ```toml
//! [dev-dependencies]
//! batchsync-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;

pub use builders::*;
pub use helpers::*;
