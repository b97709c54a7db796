//! In-process [`ChatStore`] backed by hash maps.
//!
//! Used by `byokd` when no external database is wired in, and by tests.
//! Each operation takes the lock once, matching the single-row atomicity
//! the gateway relies on; nothing spans statements.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::ChatStore;
use crate::types::{
    Conversation, ConversationStatus, ModelRecord, NewMessage, ProviderRecord, StoredMessage,
};
use crate::{GatewayError, Result};

#[derive(Default)]
struct Tables {
    providers: HashMap<String, ProviderRecord>,
    models: HashMap<String, ModelRecord>,
    conversations: HashMap<String, Conversation>,
    messages: Vec<StoredMessage>,
}

impl Tables {
    /// A conversation that has not been soft-deleted.
    fn live_conversation_mut(&mut self, conversation_id: &str) -> Result<&mut Conversation> {
        self.conversations
            .get_mut(conversation_id)
            .filter(|c| !c.is_deleted)
            .ok_or(GatewayError::ConversationNotFound)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a provider row (keyed by id).
    pub fn put_provider(&self, provider: ProviderRecord) {
        self.tables
            .write()
            .providers
            .insert(provider.id.clone(), provider);
    }

    /// Insert or replace a model row (keyed by slug).
    pub fn put_model(&self, model: ModelRecord) {
        self.tables.write().models.insert(model.slug.clone(), model);
    }

    /// Every message row of a conversation, soft-deleted ones included.
    pub fn raw_messages(&self, conversation_id: &str) -> Vec<StoredMessage> {
        self.tables
            .read()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// A conversation row regardless of owner or deletion flag.
    pub fn raw_conversation(&self, id: &str) -> Option<Conversation> {
        self.tables.read().conversations.get(id).cloned()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_model(
        &self,
        slug: &str,
        include_deleted: bool,
    ) -> Result<Option<(ModelRecord, ProviderRecord)>> {
        let tables = self.tables.read();
        let Some(model) = tables.models.get(slug) else {
            return Ok(None);
        };
        if model.is_deleted && !include_deleted {
            return Ok(None);
        }
        let provider = tables.providers.get(&model.provider_id).ok_or_else(|| {
            GatewayError::Store(format!(
                "model {} references missing provider {}",
                model.slug, model.provider_id
            ))
        })?;
        Ok(Some((model.clone(), provider.clone())))
    }

    async fn find_conversation(&self, id: &str, user_id: &str) -> Result<Option<Conversation>> {
        Ok(self
            .tables
            .read()
            .conversations
            .get(id)
            .filter(|c| !c.is_deleted && c.user_id == user_id)
            .cloned())
    }

    async fn create_conversation(&self, conversation: Conversation) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.conversations.contains_key(&conversation.id) {
            return Err(GatewayError::Store(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        tables
            .conversations
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>> {
        let tables = self.tables.read();
        let mut messages: Vec<StoredMessage> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && !m.is_deleted)
            .cloned()
            .collect();
        // stable: rows with equal timestamps keep insertion order
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<StoredMessage> {
        let mut tables = self.tables.write();
        match tables.conversations.get(&message.conversation_id) {
            Some(c) if !c.is_deleted => {}
            _ => {
                return Err(GatewayError::Store(format!(
                    "conversation {} does not exist",
                    message.conversation_id
                )));
            }
        }
        let stored = StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id,
            role: message.role,
            parts: message.parts,
            details: message.details,
            is_deleted: false,
            version: 0,
            created_at: Utc::now(),
        };
        tables.messages.push(stored.clone());
        Ok(stored)
    }

    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let conv = tables.live_conversation_mut(conversation_id)?;
        conv.title = title.to_string();
        conv.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_conversation(&self, conversation_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write();
        let conv = tables.live_conversation_mut(conversation_id)?;
        conv.last_message_at = Some(at);
        conv.updated_at = at;
        Ok(())
    }

    async fn soft_delete_conversation(&self, conversation_id: &str) -> Result<usize> {
        let mut tables = self.tables.write();
        let conv = tables
            .conversations
            .get_mut(conversation_id)
            .ok_or(GatewayError::ConversationNotFound)?;
        conv.is_deleted = true;
        conv.status = ConversationStatus::Deleted;
        conv.updated_at = Utc::now();

        let mut flagged = 0;
        for msg in tables
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id && !m.is_deleted)
        {
            msg.is_deleted = true;
            flagged += 1;
        }
        Ok(flagged)
    }
}
