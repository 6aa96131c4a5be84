//! Closed set of error kinds carried by error envelopes.

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Classification of every failure the client can report.
///
/// The kind drives three independent decisions: whether the retry scheduler
/// tries again, whether the circuit breaker counts the failure against the
/// upstream, and the default `recoverable` flag on the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Request rejected as malformed (400, 422)
    Validation,
    /// Resource does not exist (404)
    NotFound,
    /// Credential missing, rejected (401), or could not be refreshed
    Authentication,
    /// Credential valid but not allowed (403)
    Authorization,
    /// Connection-level failure or a cancelled client
    Network,
    /// Attempt exceeded its deadline (408 or local timeout)
    Timeout,
    /// Upstream failure (5xx, 429)
    Server,
    /// Rejected locally because the upstream's breaker is open
    BreakerOpen,
    /// Anything unrecognized
    Unknown,
}

impl_domain_status_conversions!(ErrorKind {
    Validation => "validation",
    NotFound => "not-found",
    Authentication => "authentication",
    Authorization => "authorization",
    Network => "network",
    Timeout => "timeout",
    Server => "server",
    BreakerOpen => "breaker-open",
    Unknown => "unknown",
});

impl ErrorKind {
    /// Whether the retry scheduler should attempt the call again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Server)
    }

    /// Whether the failure says something about upstream health and should
    /// count toward tripping its circuit breaker.
    ///
    /// Client-side rejections (validation, not-found, auth) mean the upstream
    /// answered correctly, so they are recorded as healthy responses.
    pub fn counts_as_upstream_failure(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Server)
    }

    /// Default `recoverable` flag for envelopes of this kind.
    ///
    /// Authentication is recoverable only when it stems from a failed
    /// credential refresh; callers building that case override the default.
    pub fn default_recoverable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Server | Self::BreakerOpen)
    }

    /// Map an HTTP status to a kind.
    ///
    /// Unlisted statuses (including unexpected 3xx) classify as
    /// [`ErrorKind::Unknown`].
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::Server,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Authentication);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Authorization);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(408), ErrorKind::Timeout);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(302), ErrorKind::Unknown);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Unknown);
    }

    #[test]
    fn test_retry_classification() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        for kind in [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Authentication,
            ErrorKind::Authorization,
            ErrorKind::BreakerOpen,
            ErrorKind::Unknown,
        ] {
            assert!(!kind.is_retryable(), "{kind} must not be retried");
            assert!(!kind.counts_as_upstream_failure(), "{kind} must not trip the breaker");
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(ErrorKind::NotFound).unwrap(), "not-found");
        assert_eq!(serde_json::to_value(ErrorKind::BreakerOpen).unwrap(), "breaker-open");
        assert_eq!(ErrorKind::BreakerOpen.to_string(), "breaker-open");
        assert_eq!("NOT-FOUND".parse::<ErrorKind>().unwrap(), ErrorKind::NotFound);
    }
}
