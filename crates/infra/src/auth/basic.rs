//! HTTP basic credentials

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use repolink_domain::Secret;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use super::{AuthError, AuthScheme, CredentialProvider};

/// Username and password sent as `Authorization: Basic ...`.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    username: String,
    password: Secret,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: Secret) -> Self {
        Self { username: username.into(), password }
    }

    fn header_value(&self) -> Result<HeaderValue, AuthError> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password.expose()));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| AuthError::Config(format!("invalid basic credential: {e}")))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[async_trait]
impl CredentialProvider for BasicCredentials {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Basic
    }

    async fn ensure_valid(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn auth_headers(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.header_value()?);
        Ok(headers)
    }

    fn invalidate(&self) {}
}
