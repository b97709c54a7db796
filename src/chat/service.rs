//! Completion orchestration for one chat turn.
//!
//! ```text
//! Received ──► ModelResolved ──► Generating ──► Persisted ──► Responded
//!    │              │                 │
//!    └── Rejected ◄─┘                 └──► UpstreamFailed
//! ```
//!
//! The user message is stored before any upstream call. The assistant
//! message is stored after generation completes: before the response for
//! batch turns, and from the relay task for streaming turns.

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream;
use serde_json::json;
use tracing::{debug, error, info, instrument};

use crate::credentials::CredentialResolver;
use crate::providers::{AdapterSelector, BoundModel, ChatStream};
use crate::registry::ModelRegistry;
use crate::store::ChatStore;
use crate::telemetry;
use crate::types::{
    ChatEvent, ChatOptions, Conversation, Message, MessageRole, NewMessage, StoredMessage,
    UiMessage,
};
use crate::{GatewayError, Result};

use super::MAX_OUTPUT_TOKENS;
use super::prompt::{RequestGeo, build_system_prompt};
use super::relay::{Completion, count_turn, relay};
use super::title::{TITLE_CONTEXT_MESSAGES, TitleSynthesizer, should_synthesize};

/// Caller toggles read from request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnFlags {
    /// Stream tokens instead of returning one JSON body.
    pub stream: bool,
    /// Show reasoning (only honoured for reasoning-capable models).
    pub reasoning: bool,
}

impl Default for TurnFlags {
    fn default() -> Self {
        Self {
            stream: true,
            reasoning: false,
        }
    }
}

impl TurnFlags {
    fn mode(&self) -> &'static str {
        if self.stream { "stream" } else { "batch" }
    }
}

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation_id: String,
    /// Authenticated caller.
    pub user_id: String,
    pub message: UiMessage,
    pub model_id: String,
    pub flags: TurnFlags,
    pub geo: RequestGeo,
}

/// Result of a successful turn.
pub enum TurnOutcome {
    /// Batch turn; the assistant message is already stored.
    Completed {
        text: String,
        reasoning: Option<String>,
        message: StoredMessage,
    },
    /// Streaming turn; the assistant message is stored when the stream ends.
    Streaming(ChatStream),
}

impl std::fmt::Debug for TurnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnOutcome::Completed { text, .. } => {
                f.debug_struct("Completed").field("text", text).finish()
            }
            TurnOutcome::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// The completion orchestrator.
///
/// All collaborators are passed in; build one with
/// [`Gateway::builder()`](crate::Gateway::builder) or [`ChatService::new`].
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    registry: ModelRegistry,
    credentials: CredentialResolver,
    selector: AdapterSelector,
    titles: Arc<TitleSynthesizer>,
    stream_buffer: usize,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        credentials: CredentialResolver,
        selector: AdapterSelector,
        title_model: BoundModel,
        stream_buffer: usize,
    ) -> Self {
        Self {
            registry: ModelRegistry::new(store.clone()),
            titles: Arc::new(TitleSynthesizer::new(title_model, store.clone())),
            store,
            credentials,
            selector,
            stream_buffer,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn selector(&self) -> &AdapterSelector {
        &self.selector
    }

    /// Run one chat turn.
    #[instrument(
        name = "chat.turn",
        skip_all,
        fields(conversation_id = %req.conversation_id, model = %req.model_id, mode = req.flags.mode())
    )]
    pub async fn handle_turn(&self, req: TurnRequest) -> Result<TurnOutcome> {
        let mode = req.flags.mode();
        let result = self.run_turn(req).await;
        match &result {
            Ok(TurnOutcome::Completed { .. }) => count_turn(mode, telemetry::OUTCOME_OK),
            // streaming outcomes are counted by the relay
            Ok(TurnOutcome::Streaming(_)) => {}
            Err(e) if e.is_rejection() => {
                info!(error = %e, "chat turn rejected");
                count_turn(mode, telemetry::OUTCOME_REJECTED);
            }
            Err(e) => {
                error!(error = %e, "chat turn failed");
                count_turn(mode, telemetry::OUTCOME_UPSTREAM_FAILED);
            }
        }
        result
    }

    async fn run_turn(&self, req: TurnRequest) -> Result<TurnOutcome> {
        // Received
        if req.message.role != MessageRole::User {
            return Err(GatewayError::InvalidRequest(format!(
                "expected a user message, got {}",
                req.message.role.as_str()
            )));
        }
        if req.message.parts.is_empty() {
            return Err(GatewayError::InvalidRequest("message has no parts".into()));
        }
        let conversation = self
            .store
            .find_conversation(&req.conversation_id, &req.user_id)
            .await?
            .ok_or(GatewayError::ConversationNotFound)?;
        let resolved = self.registry.resolve(&req.model_id).await?;

        // ModelResolved
        let history = self.store.list_messages(&conversation.id).await?;
        let user_text = req.message.text();
        let user_row = self
            .store
            .insert_message(NewMessage {
                conversation_id: conversation.id.clone(),
                role: MessageRole::User,
                parts: req.message.parts,
                details: Some(json!({ "status": "received" })),
            })
            .await?;
        self.store
            .touch_conversation(&conversation.id, user_row.created_at)
            .await?;
        debug!(message_id = %user_row.id, "user message persisted");

        let credentials = self.credentials.resolve(&resolved.provider).await;
        let mut bound = self.selector.select(&resolved, &credentials);
        if req.flags.reasoning && resolved.model.capabilities.has_reasoning {
            bound = bound.with_reasoning();
        }

        let prior: Vec<Message> = history.iter().filter_map(prompt_message).collect();
        let user_message = Message::user(user_text);

        if should_synthesize(&conversation, history.len() + 1) {
            let opening: Vec<Message> = prior
                .iter()
                .cloned()
                .chain(std::iter::once(user_message.clone()))
                .take(TITLE_CONTEXT_MESSAGES)
                .collect();
            self.titles.spawn(conversation.id.clone(), opening);
        }

        // Generating
        let mut prompt = Vec::with_capacity(prior.len() + 2);
        prompt.push(Message::system(build_system_prompt(&req.geo, Utc::now())));
        prompt.extend(prior);
        prompt.push(user_message);

        let options = ChatOptions::new(&bound.model).max_tokens(MAX_OUTPUT_TOKENS);
        let completion = Completion::new(
            self.store.clone(),
            &conversation.id,
            &bound,
            req.flags.mode(),
        );

        if req.flags.stream {
            let upstream = if resolved.model.capabilities.supports_streaming {
                bound.provider.chat_stream(&prompt, &options).await?
            } else {
                debug!("model does not stream, replaying batch response");
                let response = bound.provider.chat(&prompt, &options).await?;
                replay(response)
            };
            return Ok(TurnOutcome::Streaming(relay(
                upstream,
                completion,
                self.stream_buffer,
            )));
        }

        let response = bound.provider.chat(&prompt, &options).await?;
        let message = completion.persist(&response).await?;
        Ok(TurnOutcome::Completed {
            text: response.content,
            reasoning: response.reasoning,
            message,
        })
    }

    /// Create an empty conversation owned by `user_id`.
    pub async fn create_conversation(&self, user_id: &str) -> Result<Conversation> {
        let conversation = Conversation::new(user_id, Utc::now());
        self.store.create_conversation(conversation.clone()).await?;
        Ok(conversation)
    }

    /// A conversation owned by `user_id` with its messages.
    pub async fn load_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(Conversation, Vec<StoredMessage>)> {
        let conversation = self
            .store
            .find_conversation(conversation_id, user_id)
            .await?
            .ok_or(GatewayError::ConversationNotFound)?;
        let messages = self.store.list_messages(conversation_id).await?;
        Ok((conversation, messages))
    }

    /// Soft-delete a conversation owned by `user_id` and its messages.
    #[instrument(name = "chat.delete", skip(self))]
    pub async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<usize> {
        self.store
            .find_conversation(conversation_id, user_id)
            .await?
            .ok_or(GatewayError::ConversationNotFound)?;
        let flagged = self.store.soft_delete_conversation(conversation_id).await?;
        info!(messages = flagged, "conversation deleted");
        Ok(flagged)
    }
}

/// Prompt form of a stored message; tool and data rows are not replayed.
fn prompt_message(stored: &StoredMessage) -> Option<Message> {
    let text = stored.text();
    if text.is_empty() {
        return None;
    }
    match stored.role {
        MessageRole::User => Some(Message::user(text)),
        MessageRole::Assistant => Some(Message::assistant(text)),
        MessageRole::System => Some(Message::system(text)),
        MessageRole::Data | MessageRole::Tool => None,
    }
}

/// Turn a batch response into the event stream a streaming upstream would produce.
fn replay(response: crate::types::ChatResponse) -> ChatStream {
    let mut events = Vec::new();
    if let Some(reasoning) = response.reasoning {
        events.push(Ok(ChatEvent::Reasoning(reasoning)));
    }
    if !response.content.is_empty() {
        events.push(Ok(ChatEvent::Content(response.content)));
    }
    if let Some(usage) = response.usage {
        events.push(Ok(ChatEvent::Usage(usage)));
    }
    events.push(Ok(ChatEvent::Done));
    Box::pin(stream::iter(events))
}
