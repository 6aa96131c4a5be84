//! Resilient repository client
//!
//! [`RepositoryClient`] is the only entry point. For every call it:
//!
//! 1. builds a fresh [`RequestContext`] and tracing span
//! 2. serves cacheable GETs from the response cache when possible
//! 3. runs the retry executor until it settles or the client closes
//! 4. obtains credentials for each attempt under the attempt deadline, then
//!    sends through the upstream's circuit breaker unless the caller
//!    bypasses it
//! 5. redacts, caches, and normalizes the outcome into an [`Envelope`]
//!
//! No public method returns `Err` or panics; every failure surfaces as an
//! error envelope.

mod body;
mod builder;
mod policy;
mod stats;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use repolink_common::cache::Cache;
use repolink_common::resilience::{CircuitBreaker, RetryConfig, RetryExecutor};
use repolink_domain::{ClientConfig, Envelope, RequestContext, RequestOptions, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use urlencoding::encode;

pub use body::RequestBody;
pub use builder::RepositoryClientBuilder;
pub use policy::KindRetryPolicy;
pub use stats::{ClientStats, PerformanceSnapshot, PerformanceStats};

use crate::auth::CredentialProvider;
use crate::errors::ClientError;
use crate::http::HttpClient;
use crate::normalizer::{parse_retry_after, ResponseNormalizer};

/// Response cache keyed by `GET:{path}[?{sorted params}]`.
pub type ResponseCache = Cache<String, Value>;

/// One logical call, rebuilt into a fresh request on every attempt.
struct Call<'a> {
    method: Method,
    path: &'a str,
    params: &'a [(&'a str, &'a str)],
    body: Option<&'a RequestBody>,
}

impl Call<'_> {
    fn is_write(&self) -> bool {
        self.method != Method::GET
    }
}

/// Resilient client for a content-repository HTTP API.
///
/// Cheap to clone; clones share the cache, breaker, credentials, counters
/// and shutdown signal.
#[derive(Clone)]
pub struct RepositoryClient {
    config: Arc<ClientConfig>,
    base_url: Arc<str>,
    http: HttpClient,
    credentials: Arc<dyn CredentialProvider>,
    cache: Option<ResponseCache>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    normalizer: ResponseNormalizer,
    stats: Arc<PerformanceStats>,
    shutdown: CancellationToken,
}

impl fmt::Debug for RepositoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.credentials.scheme())
            .field("breaker", &self.breaker.name())
            .field("cache", &self.cache.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RepositoryClient {
    pub fn builder() -> RepositoryClientBuilder {
        RepositoryClientBuilder::new()
    }

    /// Client with every collaborator built from `config`.
    ///
    /// # Errors
    /// See [`RepositoryClientBuilder::build`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Client configured from `REPOLINK_*` variables or a config file.
    ///
    /// # Errors
    /// Fails when no valid configuration can be loaded.
    pub fn from_env() -> Result<Self> {
        Self::new(crate::config::load()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    //==========================================================================
    // Public operations
    //==========================================================================

    /// GET `path` with query `params`.
    ///
    /// Successful responses are cached unless `options.cache` is false.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        options: RequestOptions,
    ) -> Envelope<T> {
        let call = Call { method: Method::GET, path, params, body: None };
        self.dispatch(call, options).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Envelope<T> {
        let call = Call { method: Method::POST, path, params: &[], body: body.as_ref() };
        self.dispatch(call, options).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Envelope<T> {
        let call = Call { method: Method::PUT, path, params: &[], body: body.as_ref() };
        self.dispatch(call, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Envelope<T> {
        let call = Call { method: Method::DELETE, path, params: &[], body: None };
        self.dispatch(call, options).await
    }

    /// POST `bytes` as the multipart `file` part, with `metadata` as extra
    /// text fields. Uploads are never cached.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: &[(&str, &str)],
        options: RequestOptions,
    ) -> Envelope<T> {
        let body = RequestBody::Multipart {
            file_name: file_name.to_string(),
            bytes,
            fields: metadata.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        };
        let call = Call { method: Method::POST, path, params: &[], body: Some(&body) };
        self.dispatch(call, options.no_cache()).await
    }

    /// Probe the configured health path once.
    ///
    /// Bypasses cache, retry and breaker. A reachable upstream answering
    /// with a non-success status yields `data = false`; an unreachable one
    /// yields an error envelope.
    pub async fn health_check(&self) -> Envelope<bool> {
        let context = RequestContext::new("health-check", self.config.health_path.clone());
        let span = info_span!("repolink.health", request_id = %context.request_id);

        async {
            let started = Instant::now();
            if self.is_closed() {
                let elapsed = started.elapsed();
                return self.normalizer.to_error(&ClientError::Closed, context.request_id, elapsed, None);
            }

            let url = format!("{}{}", self.base_url, self.config.health_path);
            let timeout = self.config.timeout();
            let mut request = self.http.request(Method::GET, &url);
            match self.authorize(timeout).await {
                Ok(headers) => request = request.headers(headers),
                Err(error) => debug!(error = %error, "health check proceeding without credentials"),
            }

            let result = tokio::select! {
                () = self.shutdown.cancelled() => Err(ClientError::Closed),
                sent = tokio::time::timeout(timeout, self.http.send(request)) => {
                    sent.unwrap_or_else(|_| Err(ClientError::timed_out(timeout)))
                }
            };

            match result {
                Ok(response) => {
                    let healthy = response.status().is_success();
                    info!(status = %response.status(), healthy, "health check completed");
                    self.normalizer.to_success(healthy, context.request_id, started.elapsed(), false)
                }
                Err(error) => {
                    warn!(error = %error, "health check failed");
                    self.normalizer.to_error(&error, context.request_id, started.elapsed(), None)
                }
            }
        }
        .instrument(span)
        .await
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            circuit_breaker: self.breaker.metrics(),
            cache: self.cache.as_ref().map(|cache| cache.stats()),
            performance: self.stats.snapshot(),
        }
    }

    /// Drop cached responses matching `pattern`, or all of them.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let Some(cache) = &self.cache else {
            return 0;
        };
        let removed = match pattern {
            Some(pattern) => cache.invalidate_pattern(pattern),
            None => cache.clear(),
        };
        debug!(pattern, removed, "cleared response cache");
        removed
    }

    /// Close this client's breaker. Breakers of other upstreams sharing the
    /// registry are untouched.
    pub fn reset_circuit_breaker(&self) {
        self.breaker.reset();
        info!(breaker = %self.breaker.name(), "circuit breaker reset");
    }

    /// Reject new calls and abort in-flight attempts.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
            info!(upstream = %self.breaker.name(), "repository client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    //==========================================================================
    // Orchestration
    //==========================================================================

    async fn dispatch<T: DeserializeOwned>(&self, call: Call<'_>, options: RequestOptions) -> Envelope<T> {
        let context = RequestContext::for_call(call.method.as_str(), call.path, &options.context);
        let span = info_span!(
            "repolink.request",
            request_id = %context.request_id,
            method = %call.method,
            path = %call.path,
            operation = %context.operation,
        );

        async {
            let started = Instant::now();
            let (envelope, attempts) = self.run(&call, &options, &context, started).await;
            let elapsed = started.elapsed();

            if envelope.is_success() {
                if envelope.is_cached() {
                    self.stats.record_cache_hit(elapsed);
                } else {
                    self.stats.record(true, elapsed, attempts);
                    info!(attempts, duration_ms = elapsed.as_millis() as u64, "request succeeded");
                }
            } else {
                self.stats.record(false, elapsed, attempts);
                warn!(
                    attempts,
                    duration_ms = elapsed.as_millis() as u64,
                    kind = ?envelope.error_kind(),
                    "request failed"
                );
            }
            envelope
        }
        .instrument(span)
        .await
    }

    /// Returns the envelope and the number of transport attempts made.
    async fn run<T: DeserializeOwned>(
        &self,
        call: &Call<'_>,
        options: &RequestOptions,
        context: &RequestContext,
        started: Instant,
    ) -> (Envelope<T>, u32) {
        let request_id = context.request_id;

        if self.is_closed() {
            return (self.normalizer.to_error(&ClientError::Closed, request_id, started.elapsed(), None), 0);
        }

        let cache_key = self.cache_key(call, options);
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(value) = cache.get(key) {
                match serde_json::from_value::<T>(value) {
                    Ok(data) => {
                        debug!(key = %key, "served from cache");
                        return (self.normalizer.to_success(data, request_id, started.elapsed(), true), 0);
                    }
                    Err(error) => debug!(key = %key, error = %error, "cached value did not decode"),
                }
            }
        }

        let retry = self.retry.with_max_attempts(options.max_attempts(self.retry.max_attempts));
        let executor = RetryExecutor::new(retry, KindRetryPolicy::new(self.retry.max_delay));
        let last_attempt = AtomicU32::new(0);
        let tracker = &last_attempt;
        let retried = executor.execute_with_outcome(move |attempt| {
            tracker.store(attempt, Ordering::Relaxed);
            self.attempt(call, options, attempt)
        });

        // Closing interrupts backoff sleeps as well as attempts.
        let outcome = tokio::select! {
            () = self.shutdown.cancelled() => None,
            outcome = retried => Some(outcome),
        };
        let Some(outcome) = outcome else {
            let attempts = last_attempt.load(Ordering::Relaxed);
            let envelope =
                self.normalizer.to_error(&ClientError::Closed, request_id, started.elapsed(), Some(attempts));
            return (envelope, attempts);
        };
        let attempts = outcome.attempts;

        let envelope = match outcome.result {
            Ok(value) => {
                let value = self.normalizer.redact(value);
                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    cache.set(key, value.clone(), options.cache_ttl);
                }
                if call.is_write() {
                    self.invalidate_reads(call.path);
                }
                match serde_json::from_value::<T>(value) {
                    Ok(data) => self.normalizer.to_success(data, request_id, started.elapsed(), false),
                    Err(error) => {
                        let error = ClientError::unknown(format!("failed to decode response: {error}"));
                        self.normalizer.to_error(&error, request_id, started.elapsed(), Some(attempts))
                    }
                }
            }
            Err(error) => self.normalizer.to_error(&error, request_id, started.elapsed(), Some(attempts)),
        };
        (envelope, attempts)
    }

    /// One attempt: credentials first, then the send, routed through the
    /// breaker unless bypassed. Credential failures never reach the breaker.
    async fn attempt(
        &self,
        call: &Call<'_>,
        options: &RequestOptions,
        attempt: u32,
    ) -> std::result::Result<Value, ClientError> {
        debug!(attempt, breaker = %self.breaker.state(), "dispatching attempt");
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());
        let mut headers = self.authorize(timeout).await?;
        merge_headers(&mut headers, options)?;

        if !options.circuit_breaker {
            return self.send_once(call, headers, timeout).await;
        }
        self.breaker
            .execute_classified(|| self.send_once(call, headers, timeout), ClientError::is_upstream_failure)
            .await
            .map_err(ClientError::from)
    }

    /// Credential headers, bounded by `timeout` and the shutdown signal.
    async fn authorize(&self, timeout: Duration) -> std::result::Result<HeaderMap, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        tokio::select! {
            () = self.shutdown.cancelled() => Err(ClientError::Closed),
            issued = tokio::time::timeout(timeout, self.credentials.auth_headers()) => match issued {
                Ok(headers) => headers.map_err(ClientError::from),
                Err(_) => {
                    debug!(timeout_ms = timeout.as_millis() as u64, "credential refresh exceeded deadline");
                    Err(ClientError::timed_out(timeout))
                }
            },
        }
    }

    async fn send_once(
        &self,
        call: &Call<'_>,
        headers: HeaderMap,
        timeout: Duration,
    ) -> std::result::Result<Value, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let url = format!("{}{}", self.base_url, call.path);
        let mut request = self.http.request(call.method.clone(), &url).headers(headers);
        if !call.params.is_empty() {
            request = request.query(call.params);
        }
        if let Some(body) = call.body {
            request = body.apply(request);
        }

        tokio::select! {
            () = self.shutdown.cancelled() => Err(ClientError::Closed),
            exchanged = tokio::time::timeout(timeout, self.exchange(request)) => {
                exchanged.unwrap_or_else(|_| Err(ClientError::timed_out(timeout)))
            }
        }
    }

    /// Send one request and read its body.
    async fn exchange(&self, request: reqwest::RequestBuilder) -> std::result::Result<Value, ClientError> {
        let response = self.http.send(request).await?;
        let status = response.status();
        let retry_after = response.headers().get(RETRY_AFTER).and_then(parse_retry_after);
        let text = response.text().await.map_err(ClientError::from)?;
        let body = parse_body(&text);

        if status.is_success() {
            return Ok(body);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate();
        }
        let body = if body.is_object() { body } else { Value::Null };
        Err(self.normalizer.classify_status(status.as_u16(), &body, retry_after))
    }

    fn cache_key(&self, call: &Call<'_>, options: &RequestOptions) -> Option<String> {
        if self.cache.is_none() || call.method != Method::GET || options.cache == Some(false) {
            return None;
        }
        Some(cache_key(call.path, call.params))
    }

    fn invalidate_reads(&self, path: &str) {
        if let Some(cache) = &self.cache {
            let removed = cache.invalidate_pattern(&format!("GET:{path}*"));
            if removed > 0 {
                debug!(path, removed, "invalidated cached reads after write");
            }
        }
    }
}

/// `GET:{path}` followed by `?k=v&...` with parameters sorted and each key
/// and value percent-encoded.
fn cache_key(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return format!("GET:{path}");
    }
    let mut sorted = params.to_vec();
    sorted.sort_unstable();
    let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", encode(k), encode(v))).collect();
    format!("GET:{path}?{}", query.join("&"))
}

/// JSON when the body parses, a JSON string otherwise, null when empty.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn merge_headers(headers: &mut HeaderMap, options: &RequestOptions) -> std::result::Result<(), ClientError> {
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| ClientError::Validation {
            message: format!("invalid header name '{name}'"),
            status: None,
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| ClientError::Validation {
            message: format!("invalid value for header '{name}'"),
            status: None,
        })?;
        headers.insert(name, value);
    }
    Ok(())
}
