// Persisted record types
//
// Field names serialize in camelCase: the JSON documents under the data
// directory are read by other tooling and must keep this shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Catalog entry describing how to call one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredProvider")]
pub struct ProviderTemplate {
    pub id: String,
    /// Unique across the catalog
    pub name: String,
    /// Models this provider accepts (non-empty)
    pub models: Vec<String>,
    /// Endpoint; older catalogs call this `messageUrl`
    pub url: String,
    /// Body template with `{{token}}` placeholders
    pub request_body: Value,
    /// Header template with `{{token}}` placeholders
    #[serde(default)]
    pub headers: Map<String, Value>,
}

impl ProviderTemplate {
    pub fn supports(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// On-disk provider shape; `url` and `messageUrl` may both be present
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProvider {
    id: String,
    name: String,
    models: Vec<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    message_url: Option<String>,
    request_body: Value,
    #[serde(default)]
    headers: Map<String, Value>,
}

impl From<StoredProvider> for ProviderTemplate {
    fn from(stored: StoredProvider) -> Self {
        Self {
            id: stored.id,
            name: stored.name,
            models: stored.models,
            url: endpoint(stored.url, stored.message_url),
            request_body: stored.request_body,
            headers: stored.headers,
        }
    }
}

/// `url` wins when set and non-empty, otherwise `messageUrl`
pub(crate) fn endpoint(url: Option<String>, message_url: Option<String>) -> String {
    url.filter(|u| !u.trim().is_empty())
        .or(message_url)
        .unwrap_or_default()
}

/// A user's API key for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredential {
    pub id: String,
    pub user_id: String,
    pub provider_id: String,
    pub api_key: String,
}

impl UserCredential {
    /// Copy safe to return to callers: all but the last four key characters masked
    pub fn redacted(&self) -> Self {
        Self {
            api_key: mask_key(&self.api_key),
            ..self.clone()
        }
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub user_id: String,
    /// Creation time, Unix milliseconds. Never rewritten.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored chat turn. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timestamp: i64,
}

/// Message fields supplied by the caller; id and timestamp are assigned on append
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub role: Role,
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::User,
            provider: None,
            model: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::Assistant,
            provider: None,
            model: None,
        }
    }

    pub fn with_origin(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
