//! Conversation title synthesis.
//!
//! Runs beside the main generation as a detached task. Any failure is logged
//! and counted, never surfaced to the caller, and never retried beyond the
//! client's own retry wrapper. Concurrent attempts on one conversation are
//! not serialised; the last successful write wins.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::providers::BoundModel;
use crate::providers::reasoning::{CLOSE_TAG, split_reasoning};
use crate::store::ChatStore;
use crate::telemetry;
use crate::types::{ChatOptions, Conversation, Message, Role};
use crate::{GatewayError, Result};

use super::MAX_OUTPUT_TOKENS;

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 50;
/// Messages from the start of the conversation shown to the title model.
pub const TITLE_CONTEXT_MESSAGES: usize = 4;

const TITLE_INSTRUCTION: &str = "You name chat conversations. \
Reply with a short, descriptive title for the conversation below, \
between 5 and 50 characters. Reply with the title only: no quotes, \
no punctuation at the end, no explanation.";

/// Whether a turn should attempt a title rewrite.
///
/// `history_len` counts the conversation's messages including the user
/// message of the current turn.
pub fn should_synthesize(conversation: &Conversation, history_len: usize) -> bool {
    history_len == 1 || conversation.has_placeholder_title()
}

/// Clean up raw model output into a title, or `None` if too short.
pub fn normalize_title(raw: &str) -> Option<String> {
    let after_reasoning = match raw.rfind(CLOSE_TAG) {
        Some(pos) => &raw[pos + CLOSE_TAG.len()..],
        None => raw,
    };
    let (_, visible) = split_reasoning(after_reasoning);

    let line = visible.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = strip_prefix_ignore_case(line, "title:").trim();
    let line = line
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '“' | '”' | '‘' | '’'))
        .trim();

    let title: String = line.chars().take(TITLE_MAX_CHARS).collect();
    let title = title.trim_end().to_owned();
    (title.chars().count() >= TITLE_MIN_CHARS).then_some(title)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

/// Derives a short title from the opening messages and stores it.
pub struct TitleSynthesizer {
    model: BoundModel,
    store: Arc<dyn ChatStore>,
}

impl TitleSynthesizer {
    pub fn new(model: BoundModel, store: Arc<dyn ChatStore>) -> Self {
        Self { model, store }
    }

    /// Generate and persist a title. Returns the stored title.
    #[instrument(name = "title.synthesize", skip(self, opening), fields(model = %self.model.model))]
    pub async fn synthesize(&self, conversation_id: &str, opening: &[Message]) -> Result<String> {
        let transcript: String = opening
            .iter()
            .filter(|m| m.role != Role::System)
            .take(TITLE_CONTEXT_MESSAGES)
            .map(|m| format!("{}: {}\n", role_label(m.role), m.content))
            .collect();
        if transcript.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "no messages to title".to_owned(),
            ));
        }

        let prompt = [Message::system(TITLE_INSTRUCTION), Message::user(transcript)];
        let options = ChatOptions::new(&self.model.model).max_tokens(MAX_OUTPUT_TOKENS);
        let response = self.model.provider.chat(&prompt, &options).await?;

        let title = normalize_title(&response.content).ok_or(GatewayError::EmptyResponse)?;
        self.store.update_title(conversation_id, &title).await?;
        debug!(conversation_id, title = %title, "conversation titled");
        Ok(title)
    }

    /// Fire-and-forget [`synthesize`](Self::synthesize).
    pub fn spawn(self: &Arc<Self>, conversation_id: String, opening: Vec<Message>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.synthesize(&conversation_id, &opening).await {
                Ok(_) => {
                    metrics::counter!(telemetry::TITLE_ATTEMPTS_TOTAL, "status" => "ok")
                        .increment(1);
                }
                Err(e) => {
                    warn!(conversation_id = %conversation_id, error = %e, "title synthesis failed");
                    metrics::counter!(telemetry::TITLE_ATTEMPTS_TOTAL, "status" => "error")
                        .increment(1);
                }
            }
        })
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}
