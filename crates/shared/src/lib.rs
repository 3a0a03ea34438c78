//! # baserepo Shared
//!
//! Common types used across all baserepo crates: the error taxonomy,
//! configuration file format and the execution context.

pub mod config;
pub mod context;
pub mod error;

// Re-exports
pub use config::*;
pub use context::*;
pub use error::*;
