//! Per-call request options.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

/// Caller-supplied tags merged into the call's
/// [`RequestContext`](super::RequestContext).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextTags {
    pub operation: Option<String>,
    pub resource: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

/// Options that override client defaults for a single call.
///
/// `None` fields fall back to the client configuration. The breaker is
/// consulted unless `circuit_breaker` is explicitly turned off.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Per-attempt deadline.
    pub timeout: Option<Duration>,
    /// Retries after the first attempt; `Some(0)` disables retry.
    pub retries: Option<u32>,
    /// Response caching; only GET responses are ever cached.
    pub cache: Option<bool>,
    pub cache_ttl: Option<Duration>,
    pub circuit_breaker: bool,
    pub context: ContextTags,
    /// Extra headers, applied over the credential headers.
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            retries: None,
            cache: None,
            cache_ttl: None,
            circuit_breaker: true,
            context: ContextTags::default(),
            headers: BTreeMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn no_retry(self) -> Self {
        self.retries(0)
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    pub fn no_cache(self) -> Self {
        self.cache(false)
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Skip circuit breaker evaluation entirely for this call.
    pub fn bypass_circuit_breaker(mut self) -> Self {
        self.circuit_breaker = false;
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.context.resource = Some(resource.into());
        self
    }

    pub fn context_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.extra.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Total attempts for this call given the client's configured maximum.
    pub fn max_attempts(&self, configured: u32) -> u32 {
        match self.retries {
            Some(retries) => retries.saturating_add(1),
            None => configured.max(1),
        }
    }
}
