//! Streaming relay between an upstream generation and the client.
//!
//! A spawned task drains the upstream stream into a bounded channel while
//! accumulating the full response. When the upstream finishes cleanly the
//! assistant message is persisted, and only then is the client stream
//! closed. If the client goes away mid-stream the task keeps draining so
//! the turn is still recorded. An upstream error is forwarded once and
//! nothing is persisted.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::providers::{BoundModel, ChatStream};
use crate::store::ChatStore;
use crate::telemetry;
use crate::types::{
    ChatEvent, ChatResponse, FinishReason, MessagePart, MessageRole, NewMessage, StoredMessage,
    ToolCall,
};
use crate::{GatewayError, Result};

/// Default number of events buffered between upstream and client.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Folds streamed events back into a [`ChatResponse`].
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    content: String,
    reasoning: String,
    tool_calls: BTreeMap<usize, ToolCall>,
    usage: Option<crate::types::Usage>,
}

impl ResponseAccumulator {
    pub fn push(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Content(text) => self.content.push_str(text),
            ChatEvent::Reasoning(text) => self.reasoning.push_str(text),
            ChatEvent::ToolCallStart { index, id, name } => {
                self.tool_calls.insert(
                    *index,
                    ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: String::new(),
                    },
                );
            }
            ChatEvent::ToolCallDelta { index, arguments } => {
                if let Some(call) = self.tool_calls.get_mut(index) {
                    call.arguments.push_str(arguments);
                }
            }
            ChatEvent::Usage(usage) => self.usage = Some(usage.clone()),
            ChatEvent::ToolCallEnd { .. } | ChatEvent::Done => {}
        }
    }

    pub fn finish(self, model: &str) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = self.tool_calls.into_values().collect();
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };
        ChatResponse {
            content: self.content,
            reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
            tool_calls,
            usage: self.usage,
            model: Some(model.to_owned()),
            finish_reason,
        }
    }
}

/// Persists the assistant side of one turn.
#[derive(Clone)]
pub(crate) struct Completion {
    pub store: Arc<dyn ChatStore>,
    pub conversation_id: String,
    pub provider_slug: String,
    pub model: String,
    pub fell_back: bool,
    pub mode: &'static str,
    pub started: Instant,
}

impl Completion {
    pub fn new(
        store: Arc<dyn ChatStore>,
        conversation_id: &str,
        bound: &BoundModel,
        mode: &'static str,
    ) -> Self {
        Self {
            store,
            conversation_id: conversation_id.to_owned(),
            provider_slug: bound.provider_slug.clone(),
            model: bound.model.clone(),
            fell_back: bound.fell_back,
            mode,
            started: Instant::now(),
        }
    }

    fn record_duration(&self) {
        metrics::histogram!(telemetry::GENERATION_DURATION_SECONDS,
            "provider" => self.provider_slug.clone(),
            "mode" => self.mode,
        )
        .record(self.started.elapsed().as_secs_f64());
    }

    /// Store the response as an assistant message and bump the conversation.
    pub async fn persist(&self, response: &ChatResponse) -> Result<StoredMessage> {
        self.record_duration();

        if !response.has_output() {
            return Err(GatewayError::EmptyResponse);
        }
        let parts = response_parts(response);
        if let Some(usage) = &response.usage {
            telemetry::record_usage(&self.provider_slug, usage);
        }

        let stored = self
            .store
            .insert_message(NewMessage {
                conversation_id: self.conversation_id.clone(),
                role: MessageRole::Assistant.for_response_segment(),
                parts,
                details: Some(json!({
                    "usage": response.usage,
                    "model": self.model,
                    "provider": self.provider_slug,
                    "finishReason": response.finish_reason,
                    "fallback": self.fell_back,
                })),
            })
            .await?;
        self.store
            .touch_conversation(&self.conversation_id, stored.created_at)
            .await?;
        Ok(stored)
    }
}

/// Content parts of an assistant message, in display order.
fn response_parts(response: &ChatResponse) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    if let Some(reasoning) = response.reasoning.as_deref().filter(|r| !r.is_empty()) {
        parts.push(MessagePart::reasoning(reasoning));
    }
    if !response.content.is_empty() {
        parts.push(MessagePart::text(&response.content));
    }
    for call in &response.tool_calls {
        let args = serde_json::from_str::<serde_json::Value>(&call.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
        parts.push(MessagePart::ToolInvocation {
            tool_invocation: json!({
                "state": "call",
                "toolCallId": call.id,
                "toolName": call.name,
                "args": args,
            }),
        });
    }
    parts
}

/// Relay `upstream` to the caller through a bounded channel, persisting the
/// accumulated response when it completes.
pub(crate) fn relay(upstream: ChatStream, completion: Completion, buffer: usize) -> ChatStream {
    let (tx, rx) = tokio::sync::mpsc::channel(buffer.max(1));

    tokio::spawn(async move {
        let mut upstream = upstream;
        let mut acc = ResponseAccumulator::default();
        let mut forwarding = true;

        while let Some(item) = upstream.next().await {
            match item {
                Ok(event) => {
                    acc.push(&event);
                    if forwarding && tx.send(Ok(event)).await.is_err() {
                        debug!(
                            conversation_id = %completion.conversation_id,
                            "client disconnected, draining upstream"
                        );
                        forwarding = false;
                    }
                }
                Err(e) => {
                    completion.record_duration();
                    error!(
                        conversation_id = %completion.conversation_id,
                        provider = %completion.provider_slug,
                        error = %e,
                        "upstream stream failed"
                    );
                    count_turn(completion.mode, telemetry::OUTCOME_UPSTREAM_FAILED);
                    if forwarding {
                        let _ = tx.send(Err(e)).await;
                    }
                    return;
                }
            }
        }

        let response = acc.finish(&completion.model);
        match completion.persist(&response).await {
            Ok(stored) => {
                debug!(message_id = %stored.id, "assistant message persisted");
                count_turn(completion.mode, telemetry::OUTCOME_OK);
            }
            Err(e) => {
                error!(
                    conversation_id = %completion.conversation_id,
                    error = %e,
                    "failed to persist streamed response"
                );
                count_turn(completion.mode, telemetry::OUTCOME_UPSTREAM_FAILED);
                if forwarding {
                    let _ = tx.send(Err(e)).await;
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

pub(crate) fn count_turn(mode: &'static str, outcome: &'static str) {
    metrics::counter!(telemetry::TURNS_TOTAL, "mode" => mode, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Usage;

    #[test]
    fn accumulates_text_reasoning_and_tools() {
        let mut acc = ResponseAccumulator::default();
        for event in [
            ChatEvent::Reasoning("think ".into()),
            ChatEvent::Reasoning("more".into()),
            ChatEvent::Content("Hello".into()),
            ChatEvent::Content(" world".into()),
            ChatEvent::ToolCallStart {
                index: 0,
                id: "call_1".into(),
                name: "lookup".into(),
            },
            ChatEvent::ToolCallDelta {
                index: 0,
                arguments: "{\"q\":".into(),
            },
            ChatEvent::ToolCallDelta {
                index: 0,
                arguments: "\"x\"}".into(),
            },
            ChatEvent::ToolCallEnd { index: 0 },
            ChatEvent::Usage(Usage {
                prompt_tokens: 3,
                completion_tokens: 4,
                total_tokens: 7,
            }),
            ChatEvent::Done,
        ] {
            acc.push(&event);
        }

        let response = acc.finish("m");
        assert_eq!(response.content, "Hello world");
        assert_eq!(response.reasoning.as_deref(), Some("think more"));
        assert_eq!(response.tool_calls[0].arguments, "{\"q\":\"x\"}");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(7));
    }

    #[test]
    fn parts_follow_display_order() {
        let response = ChatResponse {
            content: "answer".into(),
            reasoning: Some("why".into()),
            ..Default::default()
        };
        assert_eq!(
            response_parts(&response),
            vec![MessagePart::reasoning("why"), MessagePart::text("answer")]
        );
        assert!(response_parts(&ChatResponse::default()).is_empty());
    }
}
