//! Persisted entity shapes read and written by the gateway.
//!
//! The store owns these rows; the gateway only ever reads providers and models,
//! and appends messages / rewrites titles on conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parts::{MessagePart, MessageRole};

/// Prefix of the placeholder title given to new conversations.
///
/// A conversation whose title still starts with this prefix has never been
/// successfully titled and remains eligible for title synthesis.
pub const DEFAULT_TITLE_PREFIX: &str = "New Chat";

/// How a provider authenticates upstream requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    ApiKey,
    Oauth,
    None,
}

/// An upstream LLM vendor/account configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub id: String,
    /// Unique key; selects the adapter factory.
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth_type: AuthType,
    /// Cloud resource name for managed deployments (Azure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

/// Capability flags carried by a model row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilities {
    #[serde(default)]
    pub has_reasoning: bool,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
    #[serde(default)]
    pub supports_tool_calling: bool,
}

fn default_true() -> bool {
    true
}

/// Lifecycle status of a model row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    #[default]
    Active,
    Inactive,
    Deprecated,
}

/// A specific upstream model belonging to exactly one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub id: String,
    /// Unique key, also the upstream model identifier.
    pub slug: String,
    pub name: String,
    pub provider_id: String,
    #[serde(flatten)]
    pub capabilities: ModelCapabilities,
    #[serde(default)]
    pub status: ModelStatus,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ModelRecord {
    /// Usable by the gateway: active and not soft-deleted.
    pub fn is_servable(&self) -> bool {
        !self.is_deleted && self.status == ModelStatus::Active
    }
}

/// A model joined with its owning provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub model: ModelRecord,
    pub provider: ProviderRecord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
    Deleted,
}

/// A thread of messages owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub status: ConversationStatus,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// A fresh conversation carrying the timestamp-derived placeholder title.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: placeholder_title(now),
            user_id: user_id.into(),
            status: ConversationStatus::Active,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            last_message_at: None,
        }
    }

    pub fn has_placeholder_title(&self) -> bool {
        self.title.starts_with(DEFAULT_TITLE_PREFIX)
    }
}

fn placeholder_title(now: DateTime<Utc>) -> String {
    format!("{DEFAULT_TITLE_PREFIX} {}", now.format("%Y-%m-%d %H:%M"))
}

/// A persisted message row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub is_deleted: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn text(&self) -> String {
        super::parts::text_of(&self.parts)
    }
}

/// A message to append; the store assigns id, version and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: String,
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
    pub details: Option<serde_json::Value>,
}
