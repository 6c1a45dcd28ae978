//! Builders
//!
//! Fluent builder for the token manager.

pub mod manager;

pub use manager::{token_manager, TokenManagerBuilder};
