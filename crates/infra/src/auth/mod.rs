//! Credential providers
//!
//! The orchestrator asks a [`CredentialProvider`] for headers before every
//! attempt. Three schemes exist:
//!
//! - **basic**: stateless, header recomputed on every call
//! - **oauth**: client-credentials grant, token cached until near expiry
//! - **service-account**: signed JWT assertion exchanged for a token
//!
//! Both token schemes share [`TokenCache`], which collapses concurrent
//! refreshes into one exchange.
//!
//! ## Architecture
//!
//! ```text
//! RepositoryClient
//!     └──► CredentialProvider (trait)
//!              ├──► BasicCredentials
//!              └──► TokenCredentials ──► TokenCache (single-flight)
//!                                   └──► TokenExchanger (trait)
//!                                            ├──► ClientCredentialsExchanger
//!                                            └──► ServiceAccountExchanger
//! ```

pub mod basic;
pub mod errors;
pub mod oauth;
pub mod service_account;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use repolink_domain::{impl_domain_status_conversions, AuthConfig};
use reqwest::header::HeaderMap;

pub use basic::BasicCredentials;
pub use errors::AuthError;
pub use oauth::ClientCredentialsExchanger;
pub use service_account::{JwtAssertion, ServiceAccountExchanger};
pub use token::{AccessToken, TokenCache, TokenCredentials, TokenExchanger};

use crate::http::HttpClient;

/// Credential scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    OAuth,
    ServiceAccount,
}

impl_domain_status_conversions!(AuthScheme {
    Basic => "basic",
    OAuth => "oauth",
    ServiceAccount => "service-account",
});

/// Source of request credentials.
///
/// Implementations must be safe to call concurrently from any number of
/// in-flight requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn scheme(&self) -> AuthScheme;

    /// Make sure a usable credential is available, refreshing if needed.
    async fn ensure_valid(&self) -> Result<(), AuthError>;

    /// Headers to attach to the next request. Never returns an expired
    /// credential.
    async fn auth_headers(&self) -> Result<HeaderMap, AuthError>;

    /// Drop any cached credential so the next call refreshes.
    fn invalidate(&self);
}

/// Build the provider for `config`, sharing `http` for token exchanges.
/// A single token exchange is abandoned after `exchange_timeout`.
///
/// # Errors
/// Returns `AuthError::Config` when the key material cannot be parsed.
pub fn provider_from_config(
    config: &AuthConfig,
    http: &HttpClient,
    exchange_timeout: Duration,
) -> Result<Arc<dyn CredentialProvider>, AuthError> {
    let provider: Arc<dyn CredentialProvider> = match config {
        AuthConfig::Basic { username, password } => {
            Arc::new(BasicCredentials::new(username.clone(), password.clone()))
        }
        AuthConfig::Oauth { client_id, client_secret, token_url, scope, refresh_threshold_ms } => {
            let exchanger = ClientCredentialsExchanger::new(
                http.inner().clone(),
                token_url.clone(),
                client_id.clone(),
                client_secret.clone(),
                scope.clone(),
            );
            Arc::new(TokenCredentials::new(
                AuthScheme::OAuth,
                Arc::new(exchanger),
                TokenCache::new(Duration::from_millis(*refresh_threshold_ms))
                    .with_exchange_timeout(exchange_timeout),
            ))
        }
        AuthConfig::ServiceAccount {
            client_id,
            client_secret,
            technical_account_id,
            org_id,
            private_key,
            ims_endpoint,
            metascopes,
            exchange_path,
            assertion_ttl_secs,
            refresh_threshold_ms,
        } => {
            let assertion = JwtAssertion::new(
                org_id.clone(),
                technical_account_id.clone(),
                ims_endpoint,
                client_id,
                metascopes,
                Duration::from_secs(*assertion_ttl_secs),
                private_key.expose(),
            )?;
            let exchanger = ServiceAccountExchanger::new(
                http.inner().clone(),
                format!("{}{}", ims_endpoint.trim_end_matches('/'), exchange_path),
                client_id.clone(),
                client_secret.clone(),
                assertion,
            );
            Arc::new(TokenCredentials::new(
                AuthScheme::ServiceAccount,
                Arc::new(exchanger),
                TokenCache::new(Duration::from_millis(*refresh_threshold_ms))
                    .with_exchange_timeout(exchange_timeout),
            ))
        }
    };
    Ok(provider)
}
