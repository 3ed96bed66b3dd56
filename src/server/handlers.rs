// HTTP request handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use super::api_types::*;
use super::RelayServer;
use crate::catalog::NewProvider;
use crate::dispatch::{DispatchRequest, Dispatcher};
use crate::errors::DispatchError;
use crate::records::{Conversation, Message, NewMessage, ProviderTemplate, Role, UserCredential};
use crate::store;

/// Create the main application router
///
/// Every route is served both at the root and under `/api`.
pub fn create_router(server: Arc<RelayServer>) -> Router {
    Router::new()
        .merge(routes())
        .nest("/api", routes())
        .with_state(server)
}

fn routes() -> Router<Arc<RelayServer>> {
    Router::new()
        // Dispatch and history
        .route("/send-message", post(send_message))
        .route("/messages", post(add_message))
        .route("/messages/:conversation_id", get(get_messages))
        // Conversations
        .route("/conversations", get(list_conversations).post(create_conversation))
        .route(
            "/conversations/:id",
            get(get_conversation)
                .put(rename_conversation)
                .delete(delete_conversation),
        )
        // Provider templates
        .route("/providers", get(list_providers).post(create_provider))
        .route(
            "/providers/:id",
            get(get_provider).put(update_provider).delete(delete_provider),
        )
        // User credentials
        .route(
            "/user-api-providers",
            get(list_credentials).post(create_credential),
        )
        .route("/user-api-providers/user/:user_id", get(list_user_credentials))
        .route(
            "/user-api-providers/provider/delete/:provider_id",
            delete(delete_provider_credentials),
        )
        .route(
            "/user-api-providers/:id",
            get(get_credential)
                .put(update_credential)
                .delete(delete_credential),
        )
        .route("/health", get(health_check))
}

/// Run a store-backed operation on the blocking pool
async fn with_dispatcher<T, F>(server: &RelayServer, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Dispatcher) -> crate::errors::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let dispatcher = Arc::clone(server.dispatcher());
    Ok(store::blocking(move || f(&dispatcher)).await?)
}

/// Handle POST /send-message - one chat turn through a provider
async fn send_message(
    State(server): State<Arc<RelayServer>>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    let message = server.dispatcher().dispatch(&request).await?;
    Ok(Json(SendMessageResponse { message }))
}

/// Handle POST /messages - append a message without calling a provider
async fn add_message(
    State(server): State<Arc<RelayServer>>,
    payload: Result<Json<AddMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let Json(request) = payload?;
    if request.conversation_id.is_empty() || request.message.is_empty() || request.role.is_empty() {
        return Err(DispatchError::Validation(
            "conversationId, message and role are required".to_string(),
        )
        .into());
    }
    let role = Role::parse(&request.role).ok_or_else(|| {
        DispatchError::Validation(format!("Unknown role '{}'", request.role))
    })?;

    let message = NewMessage {
        content: request.message,
        role,
        provider: request.provider,
        model: request.model,
    };
    let conversation_id = request.conversation_id;
    let stored = with_dispatcher(&server, move |d| {
        d.conversations().append(&conversation_id, message)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Handle GET /messages/:conversation_id - history in append order
async fn get_messages(
    State(server): State<Arc<RelayServer>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages =
        with_dispatcher(&server, move |d| d.conversations().messages(&conversation_id)).await?;
    Ok(Json(messages))
}

async fn list_conversations(
    State(server): State<Arc<RelayServer>>,
    Query(filter): Query<ConversationFilter>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let conversations = with_dispatcher(&server, move |d| {
        d.conversations().list(filter.user_id.as_deref())
    })
    .await?;
    Ok(Json(conversations))
}

async fn create_conversation(
    State(server): State<Arc<RelayServer>>,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    let Json(request) = payload?;
    let conversation = with_dispatcher(&server, move |d| {
        d.conversations().create(&request.title, &request.user_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn get_conversation(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = with_dispatcher(&server, move |d| d.conversations().get(&id)).await?;
    Ok(Json(conversation))
}

async fn rename_conversation(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
    payload: Result<Json<RenameConversationRequest>, JsonRejection>,
) -> Result<Json<Conversation>, AppError> {
    let Json(request) = payload?;
    let conversation = with_dispatcher(&server, move |d| {
        d.conversations().rename(&id, &request.title)
    })
    .await?;
    Ok(Json(conversation))
}

/// Handle DELETE /conversations/:id - also drops the conversation's messages
async fn delete_conversation(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    with_dispatcher(&server, move |d| d.conversations().remove(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_providers(
    State(server): State<Arc<RelayServer>>,
) -> Result<Json<Vec<ProviderTemplate>>, AppError> {
    let providers = with_dispatcher(&server, |d| d.catalog().list()).await?;
    Ok(Json(providers))
}

async fn create_provider(
    State(server): State<Arc<RelayServer>>,
    payload: Result<Json<NewProvider>, JsonRejection>,
) -> Result<(StatusCode, Json<ProviderTemplate>), AppError> {
    let Json(request) = payload?;
    let provider = with_dispatcher(&server, move |d| d.catalog().add(request)).await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

async fn get_provider(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
) -> Result<Json<ProviderTemplate>, AppError> {
    let provider = with_dispatcher(&server, move |d| d.catalog().get(&id)).await?;
    Ok(Json(provider))
}

/// Handle PUT /providers/:id - replace the model list; the name is fixed
async fn update_provider(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProviderRequest>, JsonRejection>,
) -> Result<Json<ProviderTemplate>, AppError> {
    let Json(request) = payload?;
    let provider = with_dispatcher(&server, move |d| {
        d.catalog()
            .update_models(&id, request.models, request.name.as_deref())
    })
    .await?;
    Ok(Json(provider))
}

async fn delete_provider(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    with_dispatcher(&server, move |d| d.catalog().remove(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_credential(
    State(server): State<Arc<RelayServer>>,
    payload: Result<Json<CreateCredentialRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserCredential>), AppError> {
    let Json(request) = payload?;
    let credential = with_dispatcher(&server, move |d| {
        d.credentials()
            .register(&request.user_id, &request.provider_id, &request.api_key)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(credential.redacted())))
}

/// Handle GET /user-api-providers - every stored credential, masked
async fn list_credentials(
    State(server): State<Arc<RelayServer>>,
) -> Result<Json<Vec<UserCredential>>, AppError> {
    let credentials = with_dispatcher(&server, |d| d.credentials().list()).await?;
    Ok(Json(credentials.iter().map(UserCredential::redacted).collect()))
}

async fn list_user_credentials(
    State(server): State<Arc<RelayServer>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserCredential>>, AppError> {
    let credentials =
        with_dispatcher(&server, move |d| d.credentials().list_for_user(&user_id)).await?;
    Ok(Json(credentials.iter().map(UserCredential::redacted).collect()))
}

async fn get_credential(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
) -> Result<Json<UserCredential>, AppError> {
    let credential = with_dispatcher(&server, move |d| d.credentials().get(&id)).await?;
    Ok(Json(credential.redacted()))
}

/// Handle PUT /user-api-providers/:id - rotate the stored key
async fn update_credential(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCredentialRequest>, JsonRejection>,
) -> Result<Json<UserCredential>, AppError> {
    let Json(request) = payload?;
    let credential = with_dispatcher(&server, move |d| {
        d.credentials().replace_key(&id, &request.api_key)
    })
    .await?;
    Ok(Json(credential.redacted()))
}

async fn delete_credential(
    State(server): State<Arc<RelayServer>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    with_dispatcher(&server, move |d| d.credentials().remove(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handle DELETE /user-api-providers/provider/delete/:provider_id - drop
/// every key registered for one provider
async fn delete_provider_credentials(
    State(server): State<Arc<RelayServer>>,
    Path(provider_id): Path<String>,
) -> Result<StatusCode, AppError> {
    with_dispatcher(&server, move |d| {
        d.credentials().remove_for_provider(&provider_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handle GET /health - Health check endpoint
pub async fn health_check(State(server): State<Arc<RelayServer>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: server.uptime_seconds(),
    })
}

/// Application error wrapper for proper HTTP error responses
pub struct AppError(DispatchError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, kind = self.0.kind(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, kind = self.0.kind(), "Request rejected");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                message: self.0.to_string(),
                error_type: self.0.kind().to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        Self(err)
    }
}

/// Unparseable bodies, a missing content type and mistyped fields are all
/// reported as validation errors in the usual error body
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(DispatchError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}
