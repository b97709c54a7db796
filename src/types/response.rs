//! Generation results: the batch response and the streamed event vocabulary.

use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

/// A complete generation, either returned by a batch call or folded back
/// together from a stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Visible answer text.
    pub content: String,
    /// Reasoning, native or extracted from inline tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Model that actually served the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    /// Whether the model produced anything worth storing.
    pub fn has_output(&self) -> bool {
        !self.content.is_empty()
            || self.reasoning.as_deref().is_some_and(|r| !r.is_empty())
            || !self.tool_calls.is_empty()
    }
}

/// One event of a streamed generation.
///
/// Upstream adapters, the reasoning splitter and the relay all speak this
/// vocabulary; the HTTP layer translates it to wire chunks.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Content(String),
    Reasoning(String),
    ToolCallStart {
        index: usize,
        id: String,
        name: String,
    },
    ToolCallDelta {
        index: usize,
        arguments: String,
    },
    /// A tool call's arguments are complete; the stream continues.
    ToolCallEnd {
        index: usize,
    },
    Usage(Usage),
    Done,
}

/// Token counts reported by the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}
