// Provider catalog
//
// Lookups re-read the providers collection on every call, so a template
// registered while the server runs is visible to the next dispatch.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::errors::{DispatchError, Result};
use crate::records::{endpoint, new_id, ProviderTemplate};
use crate::store::{self, Collection, RecordStore};

/// Fields accepted when registering a provider
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "ProviderBody")]
pub struct NewProvider {
    pub name: String,
    pub models: Vec<String>,
    pub url: String,
    pub request_body: Value,
    pub headers: Map<String, Value>,
}

/// Registration body; the endpoint may arrive as `url` or `messageUrl`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderBody {
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

impl From<ProviderBody> for NewProvider {
    fn from(body: ProviderBody) -> Self {
        Self {
            name: body.name,
            models: body.models,
            url: endpoint(body.url, body.message_url),
            request_body: body.request_body,
            headers: body.headers,
        }
    }
}

#[derive(Clone)]
pub struct ProviderCatalog {
    store: Arc<dyn RecordStore>,
}

impl ProviderCatalog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<ProviderTemplate>> {
        store::load_all(self.store.as_ref(), Collection::Providers)
    }

    pub fn get(&self, id: &str) -> Result<ProviderTemplate> {
        self.list()?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| DispatchError::RecordNotFound {
                collection: "provider",
                id: id.to_string(),
            })
    }

    /// Resolve the template for `(name, model)`.
    ///
    /// Distinguishes an unknown provider from a known provider that does not
    /// list the model.
    pub fn resolve(&self, name: &str, model: &str) -> Result<ProviderTemplate> {
        tracing::debug!(provider = %name, model = %model, "Resolving provider template");

        let template = self
            .list()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| DispatchError::ProviderNotFound {
                provider: name.to_string(),
            })?;

        if !template.supports(model) {
            tracing::warn!(provider = %name, model = %model, "Model not offered by provider");
            return Err(DispatchError::ModelNotSupported {
                provider: name.to_string(),
                model: model.to_string(),
            });
        }

        Ok(template)
    }

    /// Register a provider; names are unique
    pub fn add(&self, provider: NewProvider) -> Result<ProviderTemplate> {
        if provider.name.trim().is_empty() {
            return Err(DispatchError::Validation("Provider name is required".to_string()));
        }
        if provider.models.is_empty() {
            return Err(DispatchError::Validation(
                "Provider must list at least one model".to_string(),
            ));
        }
        if provider.url.trim().is_empty() {
            return Err(DispatchError::Validation("Provider url is required".to_string()));
        }

        let created = store::modify(
            self.store.as_ref(),
            Collection::Providers,
            |providers: &mut Vec<ProviderTemplate>| {
                if providers.iter().any(|p| p.name == provider.name) {
                    return Err(DispatchError::Conflict(format!(
                        "Provider name already exists: {}",
                        provider.name
                    )));
                }
                let template = ProviderTemplate {
                    id: new_id(),
                    name: provider.name,
                    models: provider.models,
                    url: provider.url,
                    request_body: provider.request_body,
                    headers: provider.headers,
                };
                providers.push(template.clone());
                Ok(template)
            },
        )?;

        tracing::info!(provider_id = %created.id, name = %created.name, "Provider registered");
        Ok(created)
    }

    /// Replace a provider's model list. The name is immutable.
    pub fn update_models(
        &self,
        id: &str,
        models: Vec<String>,
        name: Option<&str>,
    ) -> Result<ProviderTemplate> {
        if models.is_empty() {
            return Err(DispatchError::Validation(
                "Provider must list at least one model".to_string(),
            ));
        }

        store::modify(
            self.store.as_ref(),
            Collection::Providers,
            |providers: &mut Vec<ProviderTemplate>| {
                let provider = providers.iter_mut().find(|p| p.id == id).ok_or_else(|| {
                    DispatchError::RecordNotFound {
                        collection: "provider",
                        id: id.to_string(),
                    }
                })?;
                if let Some(name) = name {
                    if name != provider.name {
                        return Err(DispatchError::Validation(
                            "Provider name cannot be modified".to_string(),
                        ));
                    }
                }
                provider.models = models;
                Ok(provider.clone())
            },
        )
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        store::modify(
            self.store.as_ref(),
            Collection::Providers,
            |providers: &mut Vec<ProviderTemplate>| {
                let before = providers.len();
                providers.retain(|p| p.id != id);
                if providers.len() == before {
                    return Err(DispatchError::RecordNotFound {
                        collection: "provider",
                        id: id.to_string(),
                    });
                }
                Ok(())
            },
        )?;
        tracing::info!(provider_id = %id, "Provider removed");
        Ok(())
    }

    /// Add the built-in templates whose names are not registered yet.
    /// Returns how many were added.
    pub fn seed_defaults(&self) -> Result<usize> {
        let existing: Vec<String> = self.list()?.into_iter().map(|p| p.name).collect();
        let mut added = 0;
        for provider in default_templates() {
            if existing.contains(&provider.name) {
                continue;
            }
            self.add(provider)?;
            added += 1;
        }
        Ok(added)
    }
}

/// Built-in OpenAI and Anthropic templates
pub fn default_templates() -> Vec<NewProvider> {
    let mut openai_headers = Map::new();
    openai_headers.insert("Authorization".to_string(), json!("Bearer {{apiKey}}"));
    openai_headers.insert("Content-Type".to_string(), json!("application/json"));

    let mut anthropic_headers = Map::new();
    anthropic_headers.insert("x-api-key".to_string(), json!("{{apiKey}}"));
    anthropic_headers.insert("anthropic-version".to_string(), json!("2023-06-01"));
    anthropic_headers.insert("content-type".to_string(), json!("application/json"));

    vec![
        NewProvider {
            name: "openai".to_string(),
            models: vec![
                "gpt-4o".to_string(),
                "gpt-4o-mini".to_string(),
                "gpt-4".to_string(),
                "gpt-3.5-turbo".to_string(),
            ],
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            request_body: json!({
                "model": "{{model}}",
                "messages": [{"role": "user", "content": "{{userInput}}"}]
            }),
            headers: openai_headers,
        },
        NewProvider {
            name: "anthropic".to_string(),
            models: vec![
                "claude-3-5-sonnet-latest".to_string(),
                "claude-3-opus-20240229".to_string(),
                "claude-3-haiku-20240307".to_string(),
            ],
            url: "https://api.anthropic.com/v1/messages".to_string(),
            request_body: json!({
                "model": "{{model}}",
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": "{{userInput}}"}]
            }),
            headers: anthropic_headers,
        },
    ]
}
