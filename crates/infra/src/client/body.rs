//! Request payloads

use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::Serialize;
use serde_json::Value;

/// Body attached to a write call.
///
/// Payloads are kept as owned data so every retry attempt can rebuild the
/// request from scratch.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// `application/x-www-form-urlencoded`, the format Sling POST servlets
    /// expect.
    Form(Vec<(String, String)>),
    Multipart {
        file_name: String,
        bytes: Vec<u8>,
        fields: Vec<(String, String)>,
    },
}

impl RequestBody {
    /// # Errors
    /// Fails when `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }

    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub(crate) fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Json(value) => builder.json(value),
            Self::Form(pairs) => builder.form(pairs),
            Self::Multipart { file_name, bytes, fields } => {
                let mut form =
                    Form::new().part("file", Part::bytes(bytes.clone()).file_name(file_name.clone()));
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                builder.multipart(form)
            }
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
