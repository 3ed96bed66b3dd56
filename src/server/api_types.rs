// Request and response bodies for the HTTP API
//
// Request fields default to empty so a missing field reaches validation
// and is reported as a ValidationError instead of a JSON rejection.

use serde::{Deserialize, Serialize};

/// Response body for POST /send-message
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub message: String,
}

/// Request body for POST /messages (direct append, no provider call)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddMessageRequest {
    pub conversation_id: String,
    pub message: String,
    pub role: String,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Request body for POST /conversations
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateConversationRequest {
    pub title: String,
    pub user_id: String,
}

/// Request body for PUT /conversations/:id
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenameConversationRequest {
    pub title: String,
}

/// Query string for GET /conversations
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationFilter {
    pub user_id: Option<String>,
}

/// Request body for PUT /providers/:id
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProviderRequest {
    pub models: Vec<String>,
    pub name: Option<String>,
}

/// Request body for POST /user-api-providers
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCredentialRequest {
    pub user_id: String,
    pub provider_id: String,
    pub api_key: String,
}

/// Request body for PUT /user-api-providers/:id
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCredentialRequest {
    pub api_key: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error body: `{"error": {"message": ..., "type": kind}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
}
