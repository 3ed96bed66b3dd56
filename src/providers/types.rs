// Outbound request representation shared by every provider style

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Concrete HTTP request produced from a provider template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundRequest {
    pub url: String,
    /// Header name/value pairs in template order
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl OutboundRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Set a header, replacing any existing value regardless of case
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Header list with secrets replaced, for logging
    pub fn redacted_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(k, v)| {
                let sensitive = k.eq_ignore_ascii_case("authorization")
                    || k.eq_ignore_ascii_case("x-api-key")
                    || k.eq_ignore_ascii_case("api-key");
                let value = if sensitive { "<redacted>".to_string() } else { v.clone() };
                (k.clone(), value)
            })
            .collect()
    }
}

/// How unknown `{{token}}` placeholders are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
    /// An unknown token fails the build
    #[default]
    Strict,
    /// An unknown token becomes the empty string
    Lenient,
}
