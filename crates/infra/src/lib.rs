//! # RepoLink Infrastructure
//!
//! Everything that performs I/O on behalf of the RepoLink client.
//!
//! This crate contains:
//! - The resilient request orchestrator ([`RepositoryClient`])
//! - Credential providers (basic, OAuth client credentials, service account)
//! - The HTTP transport wrapper and response normalizer
//! - Configuration loading and tracing bootstrap
//!
//! ## Architecture
//! - Builds on the cache and resilience primitives in `repolink-common`
//! - Speaks the envelope and configuration types from `repolink-domain`
//! - The orchestrator is the only component callers talk to

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod normalizer;
pub mod observability;

// Re-export commonly used items
pub use auth::{AuthError, AuthScheme, CredentialProvider};
pub use client::{
    ClientStats, KindRetryPolicy, PerformanceSnapshot, PerformanceStats, RepositoryClient,
    RepositoryClientBuilder, RequestBody,
};
pub use errors::ClientError;
pub use http::HttpClient;
pub use normalizer::ResponseNormalizer;
pub use observability::{init_tracing, LogFormat};
