// Integration tests for message dispatch against a scripted provider client

use async_trait::async_trait;
use chatrelay::errors::{DispatchError, Result};
use chatrelay::providers::{OutboundRequest, ProviderClient};
use chatrelay::records::Role;
use chatrelay::store::{MemoryStore, RecordStore};
use chatrelay::{DispatchRequest, Dispatcher};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// What the scripted client answers with
enum Reply {
    Json(Value),
    Status(u16, &'static str),
}

struct ScriptedClient {
    reply: Reply,
    calls: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedClient {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    async fn send(&self, provider: &str, request: &OutboundRequest) -> Result<Value> {
        self.calls.lock().unwrap().push(request.clone());
        match &self.reply {
            Reply::Json(body) => Ok(body.clone()),
            Reply::Status(status, body) => Err(DispatchError::ProviderCallFailed {
                provider: provider.to_string(),
                status: Some(*status),
                body: body.to_string(),
            }),
        }
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    client: Arc<ScriptedClient>,
    dispatcher: Dispatcher,
    conversation_id: String,
}

/// Seeded catalog, keys for u1 on both built-in providers, one conversation
fn fixture(reply: Reply) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let client = ScriptedClient::new(reply);
    let dispatcher = Dispatcher::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::clone(&client) as Arc<dyn ProviderClient>,
    );

    dispatcher.catalog().seed_defaults().unwrap();
    for provider in dispatcher.catalog().list().unwrap() {
        let key = format!("sk-{}-key", provider.name);
        dispatcher
            .credentials()
            .register("u1", &provider.id, &key)
            .unwrap();
    }
    let conversation = dispatcher.conversations().create("Chat", "u1").unwrap();

    Fixture {
        store,
        client,
        dispatcher,
        conversation_id: conversation.id,
    }
}

fn openai_reply(text: &str) -> Reply {
    Reply::Json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
    }))
}

#[tokio::test]
async fn test_dispatch_records_both_turns() {
    let fx = fixture(openai_reply("hi there"));
    let request = DispatchRequest::new(&fx.conversation_id, "hello", "openai", "gpt-4", "u1");

    let reply = fx.dispatcher.dispatch(&request).await.unwrap();
    assert_eq!(reply, "hi there");

    let messages = fx.dispatcher.conversations().messages(&fx.conversation_id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "hi there");
    assert_eq!(messages[1].provider.as_deref(), Some("openai"));
    assert_eq!(messages[1].model.as_deref(), Some("gpt-4"));

    let calls = fx.client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "https://api.openai.com/v1/chat/completions");
    assert_eq!(calls[0].header("authorization"), Some("Bearer sk-openai-key"));
    assert_eq!(calls[0].body["model"], "gpt-4");
    assert_eq!(calls[0].body["messages"][0]["content"], "hello");
}

#[tokio::test]
async fn test_missing_conversation_makes_no_call() {
    let fx = fixture(openai_reply("hi there"));
    let request = DispatchRequest::new("no-such-conversation", "hello", "openai", "gpt-4", "u1");

    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.kind(), "ConversationNotFound");
    assert!(fx.client.calls().is_empty());
    assert!(fx
        .dispatcher
        .conversations()
        .messages("no-such-conversation")
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_anthropic_request_uses_content_blocks() {
    let fx = fixture(Reply::Json(json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": "hi from claude"}]
    })));
    let request = DispatchRequest::new(
        &fx.conversation_id,
        "hello",
        "anthropic",
        "claude-3-haiku-20240307",
        "u1",
    );

    let reply = fx.dispatcher.dispatch(&request).await.unwrap();
    assert_eq!(reply, "hi from claude");

    let calls = fx.client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].body["messages"][0]["content"],
        json!([{"type": "text", "text": "hello"}])
    );
    assert_eq!(calls[0].header("x-api-key"), Some("sk-anthropic-key"));
    assert!(!calls[0].has_header("authorization"));
}

#[tokio::test]
async fn test_provider_error_records_nothing() {
    let fx = fixture(Reply::Status(500, r#"{"error":"overloaded"}"#));
    let request = DispatchRequest::new(&fx.conversation_id, "hello", "openai", "gpt-4", "u1");

    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.kind(), "ProviderCallFailed");
    assert_eq!(err.status_code(), 502);
    assert!(err.to_string().contains("Status: 500"));
    assert!(err.to_string().contains("overloaded"));

    let messages = fx.dispatcher.conversations().messages(&fx.conversation_id).unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_unsupported_model_makes_no_call() {
    let fx = fixture(openai_reply("unused"));
    let request = DispatchRequest::new(&fx.conversation_id, "hello", "openai", "gpt-9", "u1");

    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.kind(), "ModelNotSupported");
    assert!(fx.client.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_provider_makes_no_call() {
    let fx = fixture(openai_reply("unused"));
    let request = DispatchRequest::new(&fx.conversation_id, "hello", "mistral", "gpt-4", "u1");

    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.kind(), "ProviderNotFound");
    assert!(fx.client.calls().is_empty());
}

#[tokio::test]
async fn test_missing_credential_makes_no_call() {
    let fx = fixture(openai_reply("unused"));
    let request = DispatchRequest::new(&fx.conversation_id, "hello", "openai", "gpt-4", "u2");

    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.kind(), "CredentialNotFound");
    assert_eq!(err.status_code(), 404);
    assert!(fx.client.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_reply_records_nothing() {
    let fx = fixture(Reply::Json(json!({"choices": []})));
    let request = DispatchRequest::new(&fx.conversation_id, "hello", "openai", "gpt-4", "u1");

    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.kind(), "ProviderResponseMalformed");
    assert!(fx
        .dispatcher
        .conversations()
        .messages(&fx.conversation_id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_repeated_dispatch_appends_again() {
    let fx = fixture(openai_reply("hi there"));
    let request = DispatchRequest::new(&fx.conversation_id, "hello", "openai", "gpt-4", "u1");

    fx.dispatcher.dispatch(&request).await.unwrap();
    fx.dispatcher.dispatch(&request).await.unwrap();

    let messages = fx.dispatcher.conversations().messages(&fx.conversation_id).unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(fx.client.calls().len(), 2);
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn test_failed_assistant_append_keeps_user_turn() {
    let fx = fixture(openai_reply("hi there"));
    // The user append is the only write allowed
    fx.store.fail_writes_after(1);

    let request = DispatchRequest::new(&fx.conversation_id, "hello", "openai", "gpt-4", "u1");
    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.kind(), "StoreIOError");

    let messages = fx.dispatcher.conversations().messages(&fx.conversation_id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn test_new_provider_is_visible_without_restart() {
    let fx = fixture(Reply::Json(json!({
        "choices": [{"message": {"role": "assistant", "content": "from grok"}}]
    })));

    let template: chatrelay::catalog::NewProvider = serde_json::from_value(json!({
        "name": "grok",
        "models": ["grok-2"],
        "url": "https://api.x.ai/v1/chat/completions",
        "requestBody": {
            "model": "{{model}}",
            "messages": [{"role": "user", "content": "{{userInput}}"}]
        },
        "headers": {"Authorization": "Bearer {{apiKey}}"}
    }))
    .unwrap();
    let grok = fx.dispatcher.catalog().add(template).unwrap();
    fx.dispatcher
        .credentials()
        .register("u1", &grok.id, "xai-key")
        .unwrap();

    let request = DispatchRequest::new(&fx.conversation_id, "hello", "grok", "grok-2", "u1");
    let reply = fx.dispatcher.dispatch(&request).await.unwrap();
    assert_eq!(reply, "from grok");
    assert_eq!(fx.client.calls()[0].url, "https://api.x.ai/v1/chat/completions");
}

#[tokio::test]
async fn test_provider_without_reply_format_makes_no_call() {
    let fx = fixture(openai_reply("unused"));

    let template: chatrelay::catalog::NewProvider = serde_json::from_value(json!({
        "name": "mistral",
        "models": ["mistral-large"],
        "url": "https://api.mistral.ai/v1/chat/completions",
        "requestBody": {
            "model": "{{model}}",
            "messages": [{"role": "user", "content": "{{userInput}}"}]
        },
        "headers": {"Authorization": "Bearer {{apiKey}}"}
    }))
    .unwrap();
    let mistral = fx.dispatcher.catalog().add(template).unwrap();
    fx.dispatcher
        .credentials()
        .register("u1", &mistral.id, "mistral-key")
        .unwrap();

    let request =
        DispatchRequest::new(&fx.conversation_id, "hello", "mistral", "mistral-large", "u1");
    let err = fx.dispatcher.dispatch(&request).await.unwrap_err();

    assert_eq!(err.kind(), "ProviderResponseMalformed");
    assert!(fx.client.calls().is_empty());
    assert!(fx
        .dispatcher
        .conversations()
        .messages(&fx.conversation_id)
        .unwrap()
        .is_empty());
}
