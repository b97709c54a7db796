//! Conversions between gateway types and llm crate types.
//!
//! This module is internal and handles the translation layer between
//! our stable public types and the llm crate's internal types.

use llm::chat::ChatMessage as LlmMessage;

use crate::types::{Message, Role, ToolCall, Usage};

/// Convert our messages to llm crate messages.
///
/// The llm crate takes the system prompt through its builder, so system
/// messages are pulled out and joined in order.
pub fn to_llm_messages(messages: &[Message]) -> (Option<String>, Vec<LlmMessage>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut llm_messages = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => system_parts.push(&msg.content),
            Role::User => {
                llm_messages.push(LlmMessage::user().content(msg.content.clone()).build());
            }
            Role::Assistant => {
                llm_messages.push(
                    LlmMessage::assistant()
                        .content(msg.content.clone())
                        .build(),
                );
            }
        }
    }

    let system_prompt = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    (system_prompt, llm_messages)
}

/// Convert llm crate tool calls to our format
pub fn from_llm_tool_calls(calls: &[llm::ToolCall]) -> Vec<ToolCall> {
    calls
        .iter()
        .map(|c| ToolCall {
            id: c.id.clone(),
            name: c.function.name.clone(),
            arguments: c.function.arguments.clone(),
        })
        .collect()
}

/// Convert llm crate usage to our format
pub fn from_llm_usage(usage: &llm::chat::Usage) -> Usage {
    Usage::new(usage.prompt_tokens, usage.completion_tokens)
}
