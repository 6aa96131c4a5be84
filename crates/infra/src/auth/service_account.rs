//! Service-account (JWT bearer) grant
//!
//! A signed assertion identifying the technical account is exchanged at the
//! identity service for an access token. Each exchange signs a fresh
//! assertion so `iat`/`exp` always reflect the moment of the request.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use repolink_domain::Secret;
use serde_json::{Map, Value};
use tracing::debug;

use super::token::{read_token_response, AccessToken, TokenExchanger};
use super::AuthError;

/// RS256 assertion builder for one technical account.
#[derive(Clone)]
pub struct JwtAssertion {
    org_id: String,
    technical_account_id: String,
    audience: String,
    metascopes: Vec<String>,
    ttl: Duration,
    key: EncodingKey,
}

impl fmt::Debug for JwtAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAssertion")
            .field("org_id", &self.org_id)
            .field("technical_account_id", &self.technical_account_id)
            .field("audience", &self.audience)
            .field("metascopes", &self.metascopes)
            .field("ttl", &self.ttl)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl JwtAssertion {
    /// # Errors
    /// Returns `AuthError::Config` when `private_key_pem` is not an RSA key
    /// in PKCS#1 or PKCS#8 PEM form.
    pub fn new(
        org_id: String,
        technical_account_id: String,
        ims_endpoint: &str,
        client_id: &str,
        metascopes: &[String],
        ttl: Duration,
        private_key_pem: &str,
    ) -> Result<Self, AuthError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| AuthError::Config(format!("invalid service account private key: {e}")))?;
        let ims = ims_endpoint.trim_end_matches('/');

        Ok(Self {
            org_id,
            technical_account_id,
            audience: format!("{ims}/c/{client_id}"),
            metascopes: metascopes.iter().map(|scope| metascope_claim(ims, scope)).collect(),
            ttl,
            key,
        })
    }

    /// Sign an assertion issued now.
    pub fn sign(&self) -> Result<String, AuthError> {
        self.sign_at(chrono::Utc::now().timestamp())
    }

    /// Sign an assertion with `iat` fixed to `issued_at` (unix seconds).
    pub fn sign_at(&self, issued_at: i64) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);

        let mut claims = Map::new();
        claims.insert("iss".into(), Value::from(self.org_id.as_str()));
        claims.insert("sub".into(), Value::from(self.technical_account_id.as_str()));
        claims.insert("aud".into(), Value::from(self.audience.as_str()));
        claims.insert("iat".into(), Value::from(issued_at));
        claims.insert("exp".into(), Value::from(issued_at.saturating_add(ttl)));
        for scope in &self.metascopes {
            claims.insert(scope.clone(), Value::Bool(true));
        }

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

/// Scopes given as bare names are qualified under the identity endpoint.
fn metascope_claim(ims: &str, scope: &str) -> String {
    if scope.contains("://") {
        scope.to_string()
    } else {
        format!("{ims}/s/{scope}")
    }
}

/// Exchanges a signed assertion for an access token.
pub struct ServiceAccountExchanger {
    http: reqwest::Client,
    exchange_url: String,
    client_id: String,
    client_secret: Secret,
    assertion: JwtAssertion,
}

impl ServiceAccountExchanger {
    pub fn new(
        http: reqwest::Client,
        exchange_url: String,
        client_id: String,
        client_secret: Secret,
        assertion: JwtAssertion,
    ) -> Self {
        Self { http, exchange_url, client_id, client_secret, assertion }
    }
}

#[async_trait]
impl TokenExchanger for ServiceAccountExchanger {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        let jwt = self.assertion.sign()?;
        debug!(client_id = %self.client_id, "exchanging service account assertion");

        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
            ("jwt_token", jwt.as_str()),
        ];
        let response = self.http.post(&self.exchange_url).form(&form).send().await?;
        read_token_response(response).await
    }
}
