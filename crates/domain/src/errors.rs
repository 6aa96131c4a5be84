//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for RepoLink setup paths (configuration, transport
/// construction, credential material).
///
/// Request-time failures never surface as this type; they are normalized
/// into an [`Envelope`](crate::types::Envelope) instead.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RepoLinkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for RepoLink operations
pub type Result<T> = std::result::Result<T, RepoLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            RepoLinkError::Config("missing host".into()).to_string(),
            "Configuration error: missing host"
        );
        assert_eq!(RepoLinkError::Auth("bad key".into()).to_string(), "Authentication error: bad key");
    }

    #[test]
    fn test_serializes_as_tagged_message() {
        let json = serde_json::to_value(RepoLinkError::Network("refused".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "Network", "message": "refused" }));
    }
}
