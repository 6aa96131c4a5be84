//! Shared helpers for client integration tests.

#![allow(dead_code)]

use repolink_domain::{AuthConfig, ClientConfig, Protocol, Secret, UpstreamConfig};
use wiremock::MockServer;

pub const BASIC_HEADER: &str = "Basic YWRtaW46YWRtaW4=";

/// Upstream pointing at a wiremock server.
pub fn upstream_for(server: &MockServer) -> UpstreamConfig {
    let address = server.address();
    UpstreamConfig {
        host: address.ip().to_string(),
        port: Some(address.port()),
        protocol: Protocol::Http,
        base_path: String::new(),
    }
}

/// Basic-auth configuration with short retry delays.
pub fn basic_config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new(
        upstream_for(server),
        AuthConfig::Basic { username: "admin".into(), password: Secret::new("admin") },
    );
    config.timeout_ms = 2_000;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config
}

/// OAuth configuration whose token endpoint lives on `server`.
pub fn oauth_config(server: &MockServer) -> ClientConfig {
    let mut config = basic_config(server);
    config.auth = AuthConfig::Oauth {
        client_id: "client-a".into(),
        client_secret: Secret::new("s3cret"),
        token_url: format!("{}/oauth/token", server.uri()),
        scope: None,
        refresh_threshold_ms: 0,
    };
    config
}

/// Number of requests `server` received for `path`.
pub async fn hits(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == path)
        .count()
}
