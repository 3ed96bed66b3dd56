// Message dispatch
//
// One chat turn end to end: resolve provider and model, resolve the user's
// key, check the conversation, call the provider once, normalize the reply,
// then record the user turn and the assistant turn.
//
// Nothing is written unless the provider call produced a usable reply. The
// two appends are not atomic: if the assistant append fails, the user turn
// stays recorded and the error is returned.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::ProviderCatalog;
use crate::conversations::ConversationStore;
use crate::credentials::{fingerprint, CredentialResolver};
use crate::errors::{DispatchError, Result};
use crate::providers::{self, ProviderClient, ProviderStyle, TemplateMode};
use crate::records::{Message, NewMessage};
use crate::store::{self, RecordStore};

/// One chat turn as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchRequest {
    pub conversation_id: String,
    pub user_input: String,
    pub provider: String,
    pub model: String,
    pub user_id: String,
}

impl DispatchRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        user_input: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_input: user_input.into(),
            provider: provider.into(),
            model: model.into(),
            user_id: user_id.into(),
        }
    }

    /// Field-presence check done by the request layer before dispatching
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("conversationId", &self.conversation_id),
            ("userInput", &self.user_input),
            ("provider", &self.provider),
            ("model", &self.model),
            ("userId", &self.user_id),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

pub struct Dispatcher {
    catalog: ProviderCatalog,
    credentials: CredentialResolver,
    conversations: ConversationStore,
    client: Arc<dyn ProviderClient>,
    template_mode: TemplateMode,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn RecordStore>, client: Arc<dyn ProviderClient>) -> Self {
        Self {
            catalog: ProviderCatalog::new(Arc::clone(&store)),
            credentials: CredentialResolver::new(Arc::clone(&store)),
            conversations: ConversationStore::new(store),
            client,
            template_mode: TemplateMode::default(),
        }
    }

    pub fn with_template_mode(mut self, mode: TemplateMode) -> Self {
        self.template_mode = mode;
        self
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Send one chat turn and return the assistant's reply text
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<String> {
        let start_time = Instant::now();

        tracing::info!(
            conversation_id = %request.conversation_id,
            provider = %request.provider,
            model = %request.model,
            user_id = %request.user_id,
            "Dispatching message"
        );

        let catalog = self.catalog.clone();
        let (provider, model) = (request.provider.clone(), request.model.clone());
        let template = store::blocking(move || catalog.resolve(&provider, &model)).await?;

        // A reply nobody can read is known to fail before any request is paid for
        if !ProviderStyle::for_provider(&template.name).reads_replies() {
            tracing::warn!(provider = %template.name, "No reply format known for provider, not calling");
            return Err(DispatchError::malformed(
                &template.name,
                "no reply format is known for this provider; request not sent",
            ));
        }

        let credentials = self.credentials.clone();
        let (user_id, provider_id) = (request.user_id.clone(), template.id.clone());
        let api_key = store::blocking(move || credentials.resolve(&user_id, &provider_id)).await?;

        // Checked before the call so a missing conversation costs no upstream request
        let conversations = self.conversations.clone();
        let conversation_id = request.conversation_id.clone();
        store::blocking(move || conversations.ensure_exists(&conversation_id)).await?;

        let outbound = providers::build_request(
            &template,
            &request.model,
            &request.user_input,
            &api_key,
            self.template_mode,
        )?;

        tracing::info!(
            conversation_id = %request.conversation_id,
            provider = %template.name,
            url = %outbound.url,
            key = %fingerprint(&api_key),
            "Calling provider API"
        );

        let body = self
            .client
            .send(&template.name, &outbound)
            .await
            .map_err(|e| {
                tracing::error!(
                    conversation_id = %request.conversation_id,
                    provider = %template.name,
                    error = %e,
                    "Provider call failed"
                );
                e
            })?;

        let reply = providers::normalize_response(&template.name, &body)?;

        self.append(
            &request.conversation_id,
            NewMessage::user(request.user_input.as_str()).with_origin(&template.name, &request.model),
        )
        .await?;

        if let Err(e) = self
            .append(
                &request.conversation_id,
                NewMessage::assistant(reply.as_str()).with_origin(&template.name, &request.model),
            )
            .await
        {
            tracing::error!(
                conversation_id = %request.conversation_id,
                error = %e,
                "Assistant reply not recorded; user turn remains without a reply"
            );
            return Err(e);
        }

        tracing::info!(
            conversation_id = %request.conversation_id,
            provider = %template.name,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            reply_chars = reply.chars().count(),
            "Dispatch complete"
        );

        Ok(reply)
    }

    async fn append(&self, conversation_id: &str, message: NewMessage) -> Result<Message> {
        let conversations = self.conversations.clone();
        let conversation_id = conversation_id.to_string();
        store::blocking(move || conversations.append(&conversation_id, message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_lists_missing_fields() {
        let request = DispatchRequest::new("c1", "", "openai", " ", "u1");
        let err = request.validate().unwrap_err();

        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(err.to_string(), "Missing required fields: userInput, model");
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        let request = DispatchRequest::new("c1", "hello", "openai", "gpt-4", "u1");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: DispatchRequest = serde_json::from_str(
            r#"{"conversationId":"c1","userInput":"hi","provider":"openai","model":"gpt-4","userId":"u1"}"#,
        )
        .unwrap();
        assert_eq!(request, DispatchRequest::new("c1", "hi", "openai", "gpt-4", "u1"));
    }
}
