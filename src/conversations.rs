// Conversations and their append-only message history
//
// Messages live in their own collection and join to conversations by id.
// Appending requires the conversation to exist; stored messages are never
// edited or reordered.

use std::sync::Arc;

use crate::errors::{DispatchError, Result};
use crate::records::{new_id, now_millis, Conversation, Message, NewMessage};
use crate::store::{self, Collection, RecordStore};

#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn RecordStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn conversations(&self) -> Result<Vec<Conversation>> {
        store::load_all(self.store.as_ref(), Collection::Conversations)
    }

    pub fn create(&self, title: &str, user_id: &str) -> Result<Conversation> {
        if title.trim().is_empty() || user_id.is_empty() {
            return Err(DispatchError::Validation("title and userId are required".to_string()));
        }

        let conversation = Conversation {
            id: new_id(),
            title: title.to_string(),
            user_id: user_id.to_string(),
            timestamp: now_millis(),
        };
        let record = conversation.clone();
        store::modify(
            self.store.as_ref(),
            Collection::Conversations,
            move |conversations: &mut Vec<Conversation>| {
                conversations.push(record);
                Ok(())
            },
        )?;

        tracing::info!(conversation_id = %conversation.id, user_id = %user_id, "Conversation created");
        Ok(conversation)
    }

    pub fn get(&self, id: &str) -> Result<Conversation> {
        self.conversations()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DispatchError::ConversationNotFound(id.to_string()))
    }

    /// Fails with ConversationNotFound unless `id` exists
    pub fn ensure_exists(&self, id: &str) -> Result<()> {
        self.get(id).map(|_| ())
    }

    /// All conversations, or only those owned by `user_id`
    pub fn list(&self, user_id: Option<&str>) -> Result<Vec<Conversation>> {
        let conversations = self.conversations()?;
        Ok(match user_id {
            Some(user_id) => conversations
                .into_iter()
                .filter(|c| c.user_id == user_id)
                .collect(),
            None => conversations,
        })
    }

    /// Change the title; the creation timestamp is left alone
    pub fn rename(&self, id: &str, title: &str) -> Result<Conversation> {
        if title.trim().is_empty() {
            return Err(DispatchError::Validation("title is required".to_string()));
        }
        store::modify(
            self.store.as_ref(),
            Collection::Conversations,
            |conversations: &mut Vec<Conversation>| {
                let conversation = conversations
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or_else(|| DispatchError::ConversationNotFound(id.to_string()))?;
                conversation.title = title.to_string();
                Ok(conversation.clone())
            },
        )
    }

    /// Delete a conversation and every message that references it.
    ///
    /// Runs under the messages write lock, the same lock `append` checks
    /// existence under, so no message can land for a removed conversation.
    pub fn remove(&self, id: &str) -> Result<()> {
        let store = self.store.as_ref();
        let dropped = store::modify(store, Collection::Messages, |messages: &mut Vec<Message>| {
            store::modify(
                store,
                Collection::Conversations,
                |conversations: &mut Vec<Conversation>| {
                    let before = conversations.len();
                    conversations.retain(|c| c.id != id);
                    if conversations.len() == before {
                        return Err(DispatchError::ConversationNotFound(id.to_string()));
                    }
                    Ok(())
                },
            )?;

            let before = messages.len();
            messages.retain(|m| m.conversation_id != id);
            Ok(before - messages.len())
        })?;

        tracing::info!(conversation_id = %id, messages = dropped, "Conversation removed");
        Ok(())
    }

    /// Append one message to an existing conversation
    pub fn append(&self, conversation_id: &str, message: NewMessage) -> Result<Message> {
        let stored = Message {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            content: message.content,
            role: message.role,
            provider: message.provider,
            model: message.model,
            timestamp: now_millis(),
        };
        let record = stored.clone();
        let store = self.store.as_ref();
        store::modify(store, Collection::Messages, move |messages: &mut Vec<Message>| {
            // Checked under the messages lock; see `remove`
            let conversations: Vec<Conversation> =
                store::load_all(store, Collection::Conversations)?;
            if !conversations.iter().any(|c| c.id == conversation_id) {
                return Err(DispatchError::ConversationNotFound(conversation_id.to_string()));
            }
            messages.push(record);
            Ok(())
        })?;

        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %stored.id,
            role = %stored.role,
            "Message appended"
        );
        Ok(stored)
    }

    /// Messages of one conversation in insertion order
    pub fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let messages: Vec<Message> = store::load_all(self.store.as_ref(), Collection::Messages)?;
        Ok(messages
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Role;
    use crate::store::MemoryStore;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Removes a conversation just before the first messages update reaches
    /// the inner store, interleaving a delete with an in-flight append
    struct RemoveBeforeMessageWrite {
        inner: Arc<MemoryStore>,
        pending: Mutex<Option<String>>,
    }

    impl RecordStore for RemoveBeforeMessageWrite {
        fn load(&self, collection: Collection) -> Result<Vec<Value>> {
            self.inner.load(collection)
        }

        fn save(&self, collection: Collection, records: Vec<Value>) -> Result<()> {
            self.inner.save(collection, records)
        }

        fn update(
            &self,
            collection: Collection,
            apply: &mut dyn FnMut(&mut Vec<Value>) -> Result<()>,
        ) -> Result<()> {
            if collection == Collection::Messages {
                let pending = self.pending.lock().unwrap().take();
                if let Some(id) = pending {
                    ConversationStore::new(self.inner.clone()).remove(&id)?;
                }
            }
            self.inner.update(collection, apply)
        }
    }

    fn conversations() -> ConversationStore {
        ConversationStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_append_preserves_order_and_fields() {
        let store = conversations();
        let conv = store.create("Trip planning", "u1").unwrap();

        store
            .append(&conv.id, NewMessage::user("first").with_origin("openai", "gpt-4"))
            .unwrap();
        store
            .append(&conv.id, NewMessage::assistant("second").with_origin("openai", "gpt-4"))
            .unwrap();
        store.append(&conv.id, NewMessage::user("third")).unwrap();

        let history = store.messages(&conv.id).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[0].model.as_deref(), Some("gpt-4"));
        assert_eq!(history[2].provider, None);
    }

    #[test]
    fn test_append_to_missing_conversation() {
        let store = conversations();
        let err = store.append("nope", NewMessage::user("hello")).unwrap_err();

        assert_eq!(err.kind(), "ConversationNotFound");
        assert!(store.messages("nope").unwrap().is_empty());
    }

    #[test]
    fn test_messages_are_scoped_to_conversation() {
        let store = conversations();
        let a = store.create("a", "u1").unwrap();
        let b = store.create("b", "u1").unwrap();

        store.append(&a.id, NewMessage::user("for a")).unwrap();
        store.append(&b.id, NewMessage::user("for b")).unwrap();

        let history = store.messages(&b.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "for b");
    }

    #[test]
    fn test_rename_keeps_timestamp() {
        let store = conversations();
        let conv = store.create("old", "u1").unwrap();

        let renamed = store.rename(&conv.id, "new").unwrap();
        assert_eq!(renamed.title, "new");
        assert_eq!(renamed.timestamp, conv.timestamp);
    }

    #[test]
    fn test_list_filters_by_user() {
        let store = conversations();
        store.create("a", "u1").unwrap();
        store.create("b", "u2").unwrap();

        assert_eq!(store.list(Some("u2")).unwrap().len(), 1);
        assert_eq!(store.list(None).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_drops_messages() {
        let store = conversations();
        let conv = store.create("a", "u1").unwrap();
        store.append(&conv.id, NewMessage::user("hi")).unwrap();

        store.remove(&conv.id).unwrap();
        assert!(store.messages(&conv.id).unwrap().is_empty());
        assert_eq!(store.get(&conv.id).unwrap_err().kind(), "ConversationNotFound");
    }

    #[test]
    fn test_append_racing_remove_leaves_no_orphan() {
        let inner = Arc::new(MemoryStore::new());
        let conv = ConversationStore::new(inner.clone())
            .create("a", "u1")
            .unwrap();

        let racing = ConversationStore::new(Arc::new(RemoveBeforeMessageWrite {
            inner: inner.clone(),
            pending: Mutex::new(Some(conv.id.clone())),
        }));
        let err = racing.append(&conv.id, NewMessage::user("hello")).unwrap_err();
        assert_eq!(err.kind(), "ConversationNotFound");

        let plain = ConversationStore::new(inner);
        assert!(plain.get(&conv.id).is_err());
        assert!(plain.messages(&conv.id).unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_conversation_keeps_messages() {
        let store = conversations();
        let conv = store.create("a", "u1").unwrap();
        store.append(&conv.id, NewMessage::user("hi")).unwrap();

        assert_eq!(store.remove("other").unwrap_err().kind(), "ConversationNotFound");
        assert_eq!(store.messages(&conv.id).unwrap().len(), 1);
    }
}
