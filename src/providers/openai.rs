// OpenAI chat-completions request shaping and reply extraction
//
// Also fits any provider speaking the same format (Grok, OpenRouter, local
// OpenAI-compatible servers) once it is mapped to this style.

use serde::Deserialize;
use serde_json::Value;

use super::types::OutboundRequest;
use crate::errors::{DispatchError, Result};

/// Ensure bearer auth is present. Templates normally carry it already.
pub fn shape(request: &mut OutboundRequest, api_key: &str) {
    if !request.has_header("authorization") {
        request.set_header("Authorization", format!("Bearer {}", api_key));
    }
}

/// Reply text lives at `choices[0].message.content`
pub fn extract_reply(provider: &str, body: &Value) -> Result<String> {
    let response: OpenAIResponse = serde_json::from_value(body.clone())
        .map_err(|e| DispatchError::malformed(provider, format!("not a chat completion: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DispatchError::malformed(provider, "response contained no choices"))?;

    choice
        .message
        .content
        .ok_or_else(|| DispatchError::malformed(provider, "first choice has no message content"))
}

// OpenAI API types

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}
