// Anthropic messages API request shaping and reply extraction
//
// Content is a list of typed blocks and auth goes in `x-api-key`, not
// `Authorization`.

use serde::Deserialize;
use serde_json::{json, Value};

use super::types::OutboundRequest;
use crate::errors::{DispatchError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Rewrite plain-string message content into text blocks and move auth to
/// `x-api-key`.
pub fn shape(request: &mut OutboundRequest, api_key: &str) {
    if let Some(messages) = request.body.get_mut("messages").and_then(Value::as_array_mut) {
        for message in messages {
            if let Some(content) = message.get_mut("content") {
                if let Some(text) = content.as_str().map(str::to_owned) {
                    *content = json!([{"type": "text", "text": text}]);
                }
            }
        }
    }

    request.remove_header("authorization");
    if !request.has_header("x-api-key") {
        request.set_header("x-api-key", api_key);
    }
    if !request.has_header("anthropic-version") {
        request.set_header("anthropic-version", ANTHROPIC_VERSION);
    }
}

/// Reply text lives at `content[0].text`
pub fn extract_reply(provider: &str, body: &Value) -> Result<String> {
    let response: MessageResponse = serde_json::from_value(body.clone())
        .map_err(|e| DispatchError::malformed(provider, format!("not a messages response: {}", e)))?;

    let block = response
        .content
        .into_iter()
        .next()
        .ok_or_else(|| DispatchError::malformed(provider, "response contained no content blocks"))?;

    block.text.ok_or_else(|| {
        DispatchError::malformed(
            provider,
            format!("first content block is '{}', not text", block.block_type),
        )
    })
}

#[derive(Debug, Clone, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}
