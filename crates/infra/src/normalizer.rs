//! Response normalization
//!
//! Turns whatever the orchestrator observed (decoded data or a
//! [`ClientError`]) into an [`Envelope`], classifies upstream error bodies,
//! and strips credentials from payloads and messages before they leave the
//! client.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use repolink_domain::constants::REDACTION_MARKER;
use repolink_domain::{Envelope, ErrorDetail, ResponseMetadata};
use reqwest::header::HeaderValue;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::ClientError;

/// Lowercase key fragments whose values are always redacted.
const SENSITIVE_KEY_FRAGMENTS: [&str; 7] =
    ["password", "token", "secret", "key", "authorization", "cookie", "session"];

/// `name=value` and `name: value` pairs whose name looks sensitive.
static SENSITIVE_PAIR: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b([\w.-]*(?:password|token|secret|key|authorization|cookie|session)[\w.-]*)(\s*[=:]\s*)("[^"]*"|[^\s,;&"]+)"#,
    )
    .ok()
});

/// Inline credentials such as `Bearer eyJ...` or `Basic dXNlcjpwYXNz`.
static INLINE_CREDENTIAL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)\b(bearer|basic)\s+[A-Za-z0-9._~+/=-]+").ok());

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|fragment| key.contains(fragment))
}

/// Stateless envelope builder and error classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn to_success<T>(
        &self,
        data: T,
        request_id: Uuid,
        duration: Duration,
        cached: bool,
    ) -> Envelope<T> {
        Envelope::success(data, metadata(request_id, duration).with_cached(cached))
    }

    /// Error envelope for `error`; `attempts` is recorded when the call went
    /// through the retry scheduler.
    pub fn to_error<T>(
        &self,
        error: &ClientError,
        request_id: Uuid,
        duration: Duration,
        attempts: Option<u32>,
    ) -> Envelope<T> {
        let mut detail = ErrorDetail::new(error.kind(), self.redact_message(&error.to_string()))
            .with_recoverable(error.is_recoverable())
            .with_retry_after_ms(error.retry_after().map(duration_ms));
        if let Some(attempts) = attempts {
            detail = detail.with_attempts(attempts);
        }
        Envelope::failure(detail, metadata(request_id, duration))
    }

    /// Replace values under sensitive keys, at any depth.
    pub fn redact(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| {
                        if is_sensitive_key(&key) {
                            (key, Value::String(REDACTION_MARKER.to_string()))
                        } else {
                            (key, self.redact(value))
                        }
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.redact(v)).collect()),
            other => other,
        }
    }

    /// Mask credential-looking fragments in free text.
    pub fn redact_message(&self, message: &str) -> String {
        let mut text = message.to_string();
        if let Some(re) = INLINE_CREDENTIAL.as_ref() {
            text = re.replace_all(&text, format!("$1 {REDACTION_MARKER}")).into_owned();
        }
        if let Some(re) = SENSITIVE_PAIR.as_ref() {
            text = re.replace_all(&text, format!("${{1}}${{2}}{REDACTION_MARKER}")).into_owned();
        }
        text
    }

    /// Classify a non-success response from its status and decoded body.
    ///
    /// The message comes from the first recognized error shape; when none
    /// matches, the canonical reason phrase is used. `body` is `Value::Null`
    /// when the response had no JSON body.
    pub fn classify_status(
        &self,
        status: u16,
        body: &Value,
        retry_after: Option<Duration>,
    ) -> ClientError {
        let message = extract_error_message(body)
            .map(|m| self.redact_message(&m))
            .unwrap_or_else(|| default_message(status));
        ClientError::from_status(status, message, retry_after)
    }
}

fn metadata(request_id: Uuid, duration: Duration) -> ResponseMetadata {
    ResponseMetadata::new(request_id, duration_ms(duration))
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_message(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status).ok().and_then(|s| s.canonical_reason()) {
        Some(reason) => format!("HTTP {status} {reason}"),
        None => format!("HTTP {status}"),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn code_and_message(code: Option<&Value>, message: Option<&Value>) -> Option<String> {
    let message = message.and_then(as_text);
    match (code.and_then(as_text), message) {
        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
        (None, Some(message)) => Some(message),
        (Some(code), None) => Some(code),
        (None, None) => None,
    }
}

/// Recognized upstream error shapes, most specific first.
fn extract_error_message(body: &Value) -> Option<String> {
    let Value::Object(map) = body else {
        return None;
    };

    // Sling servlet responses, flat (`status.code`) or nested.
    if map.contains_key("status.code") || map.contains_key("status.message") {
        if let Some(found) = code_and_message(map.get("status.code"), map.get("status.message")) {
            return Some(found);
        }
    }
    if let Some(Value::Object(status)) = map.get("status") {
        if let Some(found) = code_and_message(status.get("code"), status.get("message")) {
            return Some(found);
        }
    }

    match map.get("error") {
        Some(Value::Object(error)) => {
            if let Some(found) = code_and_message(error.get("code"), error.get("message")) {
                return Some(found);
            }
        }
        // OAuth style
        Some(error @ Value::String(_)) => {
            return code_and_message(Some(error), map.get("error_description"));
        }
        _ => {}
    }

    if let Some(Value::Array(errors)) = map.get("errors") {
        let messages: Vec<String> = errors
            .iter()
            .filter_map(|entry| match entry {
                Value::Object(e) => e.get("message").or_else(|| e.get("detail")).and_then(as_text),
                other => as_text(other),
            })
            .collect();
        if !messages.is_empty() {
            return Some(messages.join("; "));
        }
    }

    // RFC 7807 problem details
    if map.contains_key("title") || map.contains_key("detail") {
        return match (map.get("title").and_then(as_text), map.get("detail").and_then(as_text)) {
            (Some(title), Some(detail)) => Some(format!("{title}: {detail}")),
            (title, detail) => title.or(detail),
        };
    }

    map.get("message").and_then(as_text)
}

/// Parse a `Retry-After` header given as delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &HeaderValue) -> Option<Duration> {
    let text = value.to_str().ok()?.trim();
    if let Ok(seconds) = text.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = chrono::DateTime::parse_from_rfc2822(text).ok()?;
    let remaining = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(remaining.to_std().unwrap_or(Duration::ZERO))
}
