//! Retry classification for client errors

use std::time::Duration;

use repolink_common::resilience::{RetryDecision, RetryPolicy};

use crate::errors::ClientError;

/// Retries network, timeout and server failures; stops on everything else.
///
/// A server-supplied `Retry-After` replaces the computed backoff, capped at
/// `max_retry_after`.
#[derive(Debug, Clone, Copy)]
pub struct KindRetryPolicy {
    max_retry_after: Duration,
}

impl KindRetryPolicy {
    pub fn new(max_retry_after: Duration) -> Self {
        Self { max_retry_after }
    }
}

impl RetryPolicy<ClientError> for KindRetryPolicy {
    fn should_retry(&self, error: &ClientError, _attempt: u32) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Stop;
        }
        match error.retry_after() {
            Some(hint) => RetryDecision::RetryAfter(hint.min(self.max_retry_after)),
            None => RetryDecision::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> KindRetryPolicy {
        KindRetryPolicy::new(Duration::from_secs(10))
    }

    #[test]
    fn test_transient_errors_retry() {
        assert_eq!(policy().should_retry(&ClientError::network("reset"), 1), RetryDecision::Retry);
        assert_eq!(
            policy().should_retry(&ClientError::timed_out(Duration::from_secs(1)), 1),
            RetryDecision::Retry
        );
        assert_eq!(
            policy().should_retry(&ClientError::from_status(502, "bad gateway", None), 2),
            RetryDecision::Retry
        );
    }

    #[test]
    fn test_retry_after_is_capped() {
        let err = ClientError::from_status(429, "slow down", Some(Duration::from_secs(120)));
        assert_eq!(policy().should_retry(&err, 1), RetryDecision::RetryAfter(Duration::from_secs(10)));

        let err = ClientError::from_status(503, "busy", Some(Duration::from_secs(2)));
        assert_eq!(policy().should_retry(&err, 1), RetryDecision::RetryAfter(Duration::from_secs(2)));
    }

    #[test]
    fn test_unreachable_token_endpoint_waits_out_cooldown() {
        let err = ClientError::Refresh {
            message: "token endpoint unavailable".into(),
            transient: true,
            retry_after: Duration::from_secs(60),
        };
        assert_eq!(policy().should_retry(&err, 1), RetryDecision::RetryAfter(Duration::from_secs(10)));

        let rejected = ClientError::Refresh {
            message: "invalid_client".into(),
            transient: false,
            retry_after: Duration::from_secs(60),
        };
        assert_eq!(policy().should_retry(&rejected, 1), RetryDecision::Stop);
    }

    #[test]
    fn test_terminal_errors_stop() {
        for err in [
            ClientError::from_status(400, "bad", None),
            ClientError::from_status(401, "who", None),
            ClientError::from_status(403, "no", None),
            ClientError::from_status(404, "gone", None),
            ClientError::unknown("weird"),
            ClientError::Closed,
            ClientError::CircuitOpen { name: "a:443".into(), retry_after: Duration::from_secs(1) },
        ] {
            assert_eq!(policy().should_retry(&err, 1), RetryDecision::Stop, "{err}");
        }
    }
}
