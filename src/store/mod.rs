//! Persistence contract used by the gateway.
//!
//! The relational schema behind this trait is owned elsewhere; the gateway
//! only performs the typed reads and writes below. Implementations must
//! exclude soft-deleted rows from every read.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;
use crate::types::{Conversation, ModelRecord, NewMessage, ProviderRecord, StoredMessage};

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Look up a model by slug joined with its provider.
    ///
    /// With `include_deleted = false`, soft-deleted model rows are treated as absent.
    async fn find_model(
        &self,
        slug: &str,
        include_deleted: bool,
    ) -> Result<Option<(ModelRecord, ProviderRecord)>>;

    /// Conversation `id` if it exists, is not deleted, and is owned by `user_id`.
    async fn find_conversation(&self, id: &str, user_id: &str) -> Result<Option<Conversation>>;

    async fn create_conversation(&self, conversation: Conversation) -> Result<()>;

    /// Non-deleted messages of a conversation in creation order.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>>;

    /// Append a message. Version is always written as 0.
    async fn insert_message(&self, message: NewMessage) -> Result<StoredMessage>;

    /// Fails with `ConversationNotFound` once the conversation is soft-deleted.
    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<()>;

    /// Bump `last_message_at` (and `updated_at`) on a conversation.
    async fn touch_conversation(&self, conversation_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Soft-delete a conversation and cascade to its messages.
    ///
    /// Returns the number of messages flagged.
    async fn soft_delete_conversation(&self, conversation_id: &str) -> Result<usize>;
}
