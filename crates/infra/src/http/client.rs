use std::time::Duration;

use repolink_domain::{ClientConfig, RepoLinkError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::conversions::transport_setup_error;
use crate::errors::ClientError;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Pooled transport shared by every attempt and every token exchange.
///
/// Performs exactly one exchange per [`HttpClient::send`]. Retries,
/// per-attempt deadlines and breaker accounting belong to the orchestrator,
/// so the underlying client carries no overall timeout.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Transport with default settings.
    ///
    /// # Errors
    /// Returns `RepoLinkError::Network` if the TLS backend cannot start.
    pub fn new() -> Result<Self, RepoLinkError> {
        Self::builder().build()
    }

    /// Transport identifying itself with the configured user agent.
    ///
    /// # Errors
    /// See [`HttpClient::new`].
    pub fn for_config(config: &ClientConfig) -> Result<Self, RepoLinkError> {
        Self::builder().user_agent(config.user_agent.clone()).build()
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Underlying reqwest client, shared with token exchangers.
    pub fn inner(&self) -> &ReqwestClient {
        &self.client
    }

    /// Send `builder` once. Non-success statuses come back as responses.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let request = builder.build().map_err(ClientError::from)?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let response = self.client.execute(request).await.map_err(|err| {
            debug!(%method, %path, error = %err, "transport failure");
            ClientError::from(err)
        })?;

        debug!(%method, %path, status = %response.status(), "upstream responded");
        Ok(response)
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    connect_timeout: Duration,
    pool_idle_timeout: Duration,
    user_agent: Option<String>,
    accept_json: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            user_agent: None,
            accept_json: true,
        }
    }
}

impl HttpClientBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Send `Accept: application/json` unless a request overrides it.
    /// Enabled by default.
    pub fn accept_json(mut self, enabled: bool) -> Self {
        self.accept_json = enabled;
        self
    }

    /// # Errors
    /// Returns `RepoLinkError::Network` if reqwest rejects the settings.
    pub fn build(self) -> Result<HttpClient, RepoLinkError> {
        let mut builder = ReqwestClient::builder()
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if self.accept_json {
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(transport_setup_error)?;
        Ok(HttpClient { client })
    }
}
