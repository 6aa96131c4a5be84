//! OAuth2 client-credentials grant

use async_trait::async_trait;
use repolink_domain::Secret;
use tracing::debug;

use super::token::{read_token_response, AccessToken, TokenExchanger};
use super::AuthError;

/// Exchanges a client id and secret for an access token.
pub struct ClientCredentialsExchanger {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Secret,
    scope: Option<String>,
}

impl ClientCredentialsExchanger {
    pub fn new(
        http: reqwest::Client,
        token_url: String,
        client_id: String,
        client_secret: Secret,
        scope: Option<String>,
    ) -> Self {
        Self { http, token_url, client_id, client_secret, scope }
    }

    fn form(&self) -> Vec<(&'static str, &str)> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
        ];
        if let Some(scope) = self.scope.as_deref() {
            form.push(("scope", scope));
        }
        form
    }
}

#[async_trait]
impl TokenExchanger for ClientCredentialsExchanger {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        debug!(client_id = %self.client_id, "requesting client-credentials token");
        let response = self.http.post(&self.token_url).form(&self.form()).send().await?;
        read_token_response(response).await
    }
}
