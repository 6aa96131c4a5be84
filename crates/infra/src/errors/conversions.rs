//! Conversions from external infrastructure errors into client errors.

use std::time::Duration;

use repolink_common::resilience::ResilienceError;
use repolink_domain::constants::AUTH_FAILURE_COOLDOWN_MS;
use repolink_domain::RepoLinkError;
use reqwest::Error as HttpError;

use super::ClientError;
use crate::auth::AuthError;

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ClientError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for ClientError {
    fn from(err: HttpError) -> Self {
        let message = describe(&err);
        if err.is_timeout() {
            return ClientError::Timeout { message };
        }
        if err.is_connect() || err.is_request() || err.is_body() {
            return ClientError::Network { message };
        }
        if err.is_decode() {
            return ClientError::Unknown { message, status: err.status().map(|s| s.as_u16()) };
        }
        if err.is_builder() {
            return ClientError::Validation { message, status: None };
        }
        match err.status() {
            Some(status) => ClientError::from_status(status.as_u16(), message, None),
            None => ClientError::Network { message },
        }
    }
}

/// Error text without the request URL, which may carry query credentials.
fn describe(err: &HttpError) -> String {
    let mut text = err.to_string();
    if let Some(url) = err.url() {
        text = text.replace(url.as_str(), "<url>");
    }
    format!("http request failed: {text}")
}

/* -------------------------------------------------------------------------- */
/* ResilienceError<ClientError> → ClientError */
/* -------------------------------------------------------------------------- */

impl From<ResilienceError<ClientError>> for ClientError {
    fn from(err: ResilienceError<ClientError>) -> Self {
        err.into_inner_or(|name, retry_after| ClientError::CircuitOpen { name, retry_after })
    }
}

/* -------------------------------------------------------------------------- */
/* AuthError → ClientError */
/* -------------------------------------------------------------------------- */

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        ClientError::Refresh {
            transient: err.is_transient(),
            message: err.to_string(),
            retry_after: Duration::from_millis(AUTH_FAILURE_COOLDOWN_MS),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Setup-time errors → RepoLinkError */
/* -------------------------------------------------------------------------- */

impl From<AuthError> for RepoLinkError {
    fn from(err: AuthError) -> Self {
        RepoLinkError::Auth(err.to_string())
    }
}

/// Wrap a transport construction failure.
pub(crate) fn transport_setup_error(err: HttpError) -> RepoLinkError {
    RepoLinkError::Network(format!("failed to build HTTP transport: {err}"))
}
