// Error taxonomy for the relay
//
// Every lookup, build, call and persist step returns a DispatchError.
// `kind()` is the machine-readable name surfaced to HTTP callers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Missing or malformed caller input (checked before the pipeline runs)
    #[error("{0}")]
    Validation(String),

    #[error("Provider not found: {provider}")]
    ProviderNotFound { provider: String },

    #[error("Model '{model}' is not supported by provider '{provider}'")]
    ModelNotSupported { provider: String, model: String },

    #[error("No API key registered for user '{user_id}' and provider '{provider_id}'")]
    CredentialNotFound { user_id: String, provider_id: String },

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Lookup by id in one of the management collections
    #[error("{collection} record not found: {id}")]
    RecordNotFound { collection: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Template placeholder '{{{{{token}}}}}' has no value")]
    TemplateInvalid { token: String },

    #[error("{}", provider_call_message(.provider, .status, .body))]
    ProviderCallFailed {
        provider: String,
        status: Option<u16>,
        body: String,
    },

    #[error("Unrecognized response from provider '{provider}': {detail}")]
    ProviderResponseMalformed { provider: String, detail: String },

    #[error("Store failure on '{collection}': {message}")]
    StoreIo { collection: String, message: String },
}

fn provider_call_message(provider: &str, status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!(
            "{} API request failed\n\nStatus: {}\nBody: {}",
            provider, code, body
        ),
        None => format!("{} API request failed: {}", provider, body),
    }
}

impl DispatchError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Validation(_) => "ValidationError",
            DispatchError::ProviderNotFound { .. } => "ProviderNotFound",
            DispatchError::ModelNotSupported { .. } => "ModelNotSupported",
            DispatchError::CredentialNotFound { .. } => "CredentialNotFound",
            DispatchError::ConversationNotFound(_) => "ConversationNotFound",
            DispatchError::RecordNotFound { .. } => "RecordNotFound",
            DispatchError::Conflict(_) => "Conflict",
            DispatchError::TemplateInvalid { .. } => "TemplateInvalid",
            DispatchError::ProviderCallFailed { .. } => "ProviderCallFailed",
            DispatchError::ProviderResponseMalformed { .. } => "ProviderResponseMalformed",
            DispatchError::StoreIo { .. } => "StoreIOError",
        }
    }

    /// HTTP status code the server answers with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::Validation(_) | DispatchError::ModelNotSupported { .. } => 400,
            DispatchError::ProviderNotFound { .. }
            | DispatchError::CredentialNotFound { .. }
            | DispatchError::ConversationNotFound(_)
            | DispatchError::RecordNotFound { .. } => 404,
            DispatchError::Conflict(_) => 409,
            DispatchError::ProviderCallFailed { .. }
            | DispatchError::ProviderResponseMalformed { .. } => 502,
            DispatchError::TemplateInvalid { .. } | DispatchError::StoreIo { .. } => 500,
        }
    }

    pub(crate) fn store_io(collection: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DispatchError::StoreIo {
            collection: collection.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn malformed(provider: &str, detail: impl Into<String>) -> Self {
        DispatchError::ProviderResponseMalformed {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_call_failure_carries_upstream_status() {
        let err = DispatchError::ProviderCallFailed {
            provider: "openai".to_string(),
            status: Some(500),
            body: "upstream exploded".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Status: 500"));
        assert!(msg.contains("upstream exploded"));
        assert_eq!(err.kind(), "ProviderCallFailed");
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_template_error_names_token() {
        let err = DispatchError::TemplateInvalid {
            token: "temperature".to_string(),
        };
        assert_eq!(err.to_string(), "Template placeholder '{{temperature}}' has no value");
    }

    #[test]
    fn test_store_errors_map_to_server_error() {
        let err = DispatchError::store_io("messages", "disk full");
        assert_eq!(err.kind(), "StoreIOError");
        assert_eq!(err.status_code(), 500);
    }
}
