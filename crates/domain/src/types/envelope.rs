//! Uniform response envelope returned by every public client operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::ErrorKind;

/// Success-or-failure wrapper with request metadata.
///
/// Exactly one of `data` and `error` is populated, matching `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub metadata: ResponseMetadata,
}

/// Normalized failure description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

/// Per-response metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl ResponseMetadata {
    pub fn new(request_id: Uuid, duration_ms: u64) -> Self {
        Self { timestamp: Utc::now(), request_id, duration_ms, cached: None }
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = Some(cached);
        self
    }
}

impl<T> Envelope<T> {
    pub fn success(data: T, metadata: ResponseMetadata) -> Self {
        Self { success: true, data: Some(data), error: None, metadata }
    }

    pub fn failure(error: ErrorDetail, metadata: ResponseMetadata) -> Self {
        Self { success: false, data: None, error: Some(error), metadata }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Whether the payload was served from the response cache.
    pub fn is_cached(&self) -> bool {
        self.metadata.cached.unwrap_or(false)
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    /// Kind of the carried error, if this is a failure envelope.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Convert into a `Result`, dropping the metadata.
    pub fn into_result(self) -> Result<T, ErrorDetail> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ErrorDetail::new(ErrorKind::Unknown, "envelope carried no data")),
        }
    }

    /// Transform the payload, keeping error and metadata untouched.
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnOnce(T) -> U,
    {
        Envelope {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            metadata: self.metadata,
        }
    }
}

impl ErrorDetail {
    /// Error detail with the kind's default recoverability.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: kind.default_recoverable(),
            retry_after_ms: None,
            attempts: None,
        }
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_retry_after_ms(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}
