// Provider style selection
//
// Maps a catalog provider name to the strategy that shapes its requests and
// reads its replies. Adding a provider that speaks an existing format only
// needs a new row in STYLES.

use serde_json::Value;

use super::types::OutboundRequest;
use super::{anthropic, openai};
use crate::errors::{DispatchError, Result};

/// Closed set of request/response strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStyle {
    /// Chat-completions format, bearer auth
    OpenAi,
    /// Content-block format, `x-api-key` auth
    Anthropic,
    /// Template sent as-is; no known reply path
    Passthrough,
}

const STYLES: &[(&str, ProviderStyle)] = &[
    ("openai", ProviderStyle::OpenAi),
    ("grok", ProviderStyle::OpenAi),
    ("openrouter", ProviderStyle::OpenAi),
    ("anthropic", ProviderStyle::Anthropic),
    ("claude", ProviderStyle::Anthropic),
];

impl ProviderStyle {
    /// Strategy for a provider name; unknown names get Passthrough
    pub fn for_provider(name: &str) -> Self {
        STYLES
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, style)| *style)
            .unwrap_or(ProviderStyle::Passthrough)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderStyle::OpenAi => "openai",
            ProviderStyle::Anthropic => "anthropic",
            ProviderStyle::Passthrough => "passthrough",
        }
    }

    /// Whether replies in this style can be normalized at all
    pub fn reads_replies(&self) -> bool {
        !matches!(self, ProviderStyle::Passthrough)
    }

    /// Apply provider-specific rewrites to a rendered request
    pub fn shape(&self, request: &mut OutboundRequest, api_key: &str) {
        match self {
            ProviderStyle::OpenAi => openai::shape(request, api_key),
            ProviderStyle::Anthropic => anthropic::shape(request, api_key),
            ProviderStyle::Passthrough => {}
        }
    }

    /// Pull the assistant's reply text out of a provider response
    pub fn extract_reply(&self, provider: &str, body: &Value) -> Result<String> {
        match self {
            ProviderStyle::OpenAi => openai::extract_reply(provider, body),
            ProviderStyle::Anthropic => anthropic::extract_reply(provider, body),
            ProviderStyle::Passthrough => Err(DispatchError::malformed(
                provider,
                "no known reply path for this provider",
            )),
        }
    }
}
