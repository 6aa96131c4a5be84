//! Credential errors

use thiserror::Error;

/// Failure to obtain or attach a credential.
///
/// `Clone` because a single refresh result is shared by every caller that
/// awaited it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credential configuration: {0}")]
    Config(String),

    #[error("Token exchange rejected (status {status:?}): {message}")]
    Exchange { status: Option<u16>, message: String },

    #[error("Token endpoint returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to sign assertion: {0}")]
    Signing(String),

    #[error("Token endpoint unreachable: {0}")]
    Transport(String),
}

impl AuthError {
    /// Failures that may clear up on their own: the token endpoint was
    /// unreachable, timed out, throttled, or answered 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Exchange { status: Some(status), .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport(err.without_url().to_string())
    }
}
