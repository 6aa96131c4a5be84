//! Per-call request context.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::options::ContextTags;

/// Identity and tags of a single client call.
///
/// Created fresh for every call and never mutated afterwards. The request id
/// is echoed in the envelope metadata and recorded on the call's tracing span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub request_id: Uuid,
    pub operation: String,
    pub resource: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl RequestContext {
    /// Context with a fresh v4 request id, issued now.
    pub fn new(operation: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            operation: operation.into(),
            resource: resource.into(),
            issued_at: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    /// Context for `method path`, with caller tags taking precedence over the
    /// derived operation and resource.
    pub fn for_call(method: &str, path: &str, tags: &ContextTags) -> Self {
        let mut context = Self::new(
            tags.operation.clone().unwrap_or_else(|| method.to_ascii_uppercase()),
            tags.resource.clone().unwrap_or_else(|| path.to_string()),
        );
        context.extra = tags.extra.clone();
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_v4() {
        let a = RequestContext::new("GET", "/a");
        let b = RequestContext::new("GET", "/a");
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.request_id.get_version_num(), 4);
    }

    #[test]
    fn test_for_call_prefers_caller_tags() {
        let derived = RequestContext::for_call("get", "/content/a", &ContextTags::default());
        assert_eq!(derived.operation, "GET");
        assert_eq!(derived.resource, "/content/a");

        let mut tags = ContextTags { operation: Some("list-pages".into()), ..Default::default() };
        tags.extra.insert("site".into(), Value::from("en"));
        let tagged = RequestContext::for_call("get", "/content/a", &tags);
        assert_eq!(tagged.operation, "list-pages");
        assert_eq!(tagged.resource, "/content/a");
        assert_eq!(tagged.extra["site"], "en");
    }
}
