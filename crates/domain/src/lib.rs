//! # RepoLink Domain
//!
//! Domain types shared by the RepoLink client crates.
//!
//! This crate contains:
//! - The uniform response envelope and the closed set of error kinds
//! - Per-call request context and request options
//! - Client configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other RepoLink crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
