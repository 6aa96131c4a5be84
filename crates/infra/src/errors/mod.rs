//! Request-time error type
//!
//! Every failure the orchestrator can observe is a [`ClientError`], one
//! variant per [`ErrorKind`]. It never escapes the public client API; the
//! normalizer turns it into an error envelope.

pub(crate) mod conversions;

use std::time::Duration;

use repolink_domain::ErrorKind;
use thiserror::Error;

/// Failure of a single client call, classified by kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Validation failed: {message}")]
    Validation { message: String, status: Option<u16> },

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Upstream rejected the credential (401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No credential could be obtained before sending. Recoverable after
    /// `retry_after`; retried within the call only when `transient`.
    #[error("Credential refresh failed: {message}")]
    Refresh { message: String, transient: bool, retry_after: Duration },

    #[error("Not authorized: {message}")]
    Authorization { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    #[error("Server error: {message}")]
    Server { message: String, status: Option<u16>, retry_after: Option<Duration> },

    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen { name: String, retry_after: Duration },

    /// The client was closed before or during the call.
    #[error("Client closed")]
    Closed,

    #[error("Unexpected response: {message}")]
    Unknown { message: String, status: Option<u16> },
}

impl ClientError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Local deadline expiry for one attempt.
    pub fn timed_out(after: Duration) -> Self {
        Self::Timeout { message: format!("no response within {}ms", after.as_millis()) }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown { message: message.into(), status: None }
    }

    /// Classify a non-success HTTP status with an already-extracted message.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match ErrorKind::from_status(status) {
            ErrorKind::Validation => Self::Validation { message, status: Some(status) },
            ErrorKind::NotFound => Self::NotFound { message },
            ErrorKind::Authentication => Self::Authentication { message },
            ErrorKind::Authorization => Self::Authorization { message },
            ErrorKind::Timeout => Self::Timeout { message },
            ErrorKind::Server => Self::Server { message, status: Some(status), retry_after },
            _ => Self::Unknown { message, status: Some(status) },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Authentication { .. } | Self::Refresh { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::Network { .. } | Self::Closed => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Server { .. } => ErrorKind::Server,
            Self::CircuitOpen { .. } => ErrorKind::BreakerOpen,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::Closed => false,
            Self::Refresh { .. } => true,
            other => other.kind().default_recoverable(),
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Closed => false,
            Self::Refresh { transient, .. } => *transient,
            other => other.kind().is_retryable(),
        }
    }

    /// Whether this failure should count against the upstream's breaker.
    pub fn is_upstream_failure(&self) -> bool {
        !matches!(self, Self::Closed) && self.kind().counts_as_upstream_failure()
    }

    /// Hint for when the call may succeed again.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Server { retry_after, .. } => *retry_after,
            Self::Refresh { retry_after, .. } | Self::CircuitOpen { retry_after, .. } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. }
            | Self::Server { status, .. }
            | Self::Unknown { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            Self::Authorization { .. } => Some(403),
            Self::Authentication { .. } => Some(401),
            _ => None,
        }
    }
}
