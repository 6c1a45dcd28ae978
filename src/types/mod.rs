//! Token Lifecycle Types
//!
//! Core type definitions for cached credentials and manager configuration.

pub mod config;
pub mod token;

pub use config::*;
pub use token::*;
