use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error body returned by the backend.
///
/// Authentication failures carry `detail`, some account endpoints use
/// `error`, and validation failures map field names to message lists.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ErrorResponse {
    /// Parse a response body, falling back to `None` for non-JSON bodies.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(detail) = self.detail.as_ref().or(self.error.as_ref()) {
            return detail.clone();
        }

        self.fields
            .iter()
            .map(|(field, value)| format!("{field}: {}", flatten_messages(value)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
