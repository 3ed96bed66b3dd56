// Provider request building and response normalization
//
// A catalog template plus (model, user input, api key) becomes a concrete
// OutboundRequest; a provider's JSON reply becomes plain text. The network
// hop sits behind the ProviderClient trait so tests can swap it out.

use async_trait::async_trait;
use serde_json::Value;

pub mod anthropic;
pub mod factory;
pub mod http;
pub mod openai;
pub mod template;
pub mod types;

pub use factory::ProviderStyle;
pub use http::HttpProviderClient;
pub use template::{render_str, render_value, Substitutions};
pub use types::{OutboundRequest, TemplateMode};

use crate::errors::Result;
use crate::records::ProviderTemplate;

/// Transport used to reach provider APIs
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// POST `request` once and return the parsed JSON body.
    ///
    /// Transport errors and non-success statuses are ProviderCallFailed.
    async fn send(&self, provider: &str, request: &OutboundRequest) -> Result<Value>;
}

/// Render a template into the request for one chat turn
pub fn build_request(
    template: &ProviderTemplate,
    model: &str,
    user_input: &str,
    api_key: &str,
    mode: TemplateMode,
) -> Result<OutboundRequest> {
    let subs = Substitutions::new(model, user_input, api_key);

    let url = render_str(&template.url, &subs, mode)?;
    let body = render_value(&template.request_body, &subs, mode)?;
    let headers = template
        .headers
        .iter()
        .map(|(name, value)| -> Result<(String, String)> {
            let value = match value {
                Value::String(s) => render_str(s, &subs, mode)?,
                other => other.to_string(),
            };
            Ok((name.clone(), value))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut request = OutboundRequest { url, headers, body };
    ProviderStyle::for_provider(&template.name).shape(&mut request, api_key);
    Ok(request)
}

/// Extract reply text from a provider response body
pub fn normalize_response(provider: &str, body: &Value) -> Result<String> {
    ProviderStyle::for_provider(provider).extract_reply(provider, body)
}
