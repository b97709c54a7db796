//! Message roles and typed content parts as exchanged with the chat UI.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Role of a persisted or inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Data,
    Tool,
}

impl MessageRole {
    /// Role under which an upstream response segment is persisted.
    ///
    /// `assistant` stays `assistant`; every other role collapses to `tool`.
    pub fn for_response_segment(self) -> Self {
        match self {
            MessageRole::Assistant => MessageRole::Assistant,
            _ => MessageRole::Tool,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Data => "data",
            MessageRole::Tool => "tool",
        }
    }
}

/// One typed segment of a message's content.
///
/// Part types the gateway does not interpret (files, sources, ...) and known
/// parts carrying extra fields are kept as the raw JSON they arrived as, so
/// they are persisted unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum MessagePart {
    Text { text: String },
    Reasoning { text: String },
    ToolInvocation { tool_invocation: Value },
    Other(Value),
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        MessagePart::Reasoning { text: text.into() }
    }

    /// Wire `type` of this part, if it has one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            MessagePart::Text { .. } => Some("text"),
            MessagePart::Reasoning { .. } => Some("reasoning"),
            MessagePart::ToolInvocation { .. } => Some("tool-invocation"),
            MessagePart::Other(value) => value.get("type").and_then(Value::as_str),
        }
    }

    /// Text carried by a `text` part, typed or raw.
    fn text_content(&self) -> Option<&str> {
        match self {
            MessagePart::Text { text } => Some(text.as_str()),
            MessagePart::Other(value) if self.kind() == Some("text") => {
                value.get("text").and_then(Value::as_str)
            }
            _ => None,
        }
    }

    /// Typed form of `value`, only when it holds exactly the known fields.
    fn typed(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.len() != 2 {
            return None;
        }
        let part = match object.get("type")?.as_str()? {
            "text" => MessagePart::text(object.get("text")?.as_str()?),
            "reasoning" => MessagePart::reasoning(object.get("text")?.as_str()?),
            "tool-invocation" => MessagePart::ToolInvocation {
                tool_invocation: object.get("toolInvocation")?.clone(),
            },
            _ => return None,
        };
        Some(part)
    }
}

impl TryFrom<Value> for MessagePart {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        if !value.get("type").is_some_and(Value::is_string) {
            return Err("message part must be an object with a string `type`".to_string());
        }
        match Self::typed(&value) {
            Some(part) => Ok(part),
            None => Ok(MessagePart::Other(value)),
        }
    }
}

impl From<MessagePart> for Value {
    fn from(part: MessagePart) -> Self {
        match part {
            MessagePart::Text { text } => json!({"type": "text", "text": text}),
            MessagePart::Reasoning { text } => json!({"type": "reasoning", "text": text}),
            MessagePart::ToolInvocation { tool_invocation } => {
                json!({"type": "tool-invocation", "toolInvocation": tool_invocation})
            }
            MessagePart::Other(value) => value,
        }
    }
}

/// A message as sent by the chat client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: MessageRole,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl UiMessage {
    /// Concatenated text parts; reasoning and tool parts are not prompt content.
    pub fn text(&self) -> String {
        text_of(&self.parts)
    }
}

pub(crate) fn text_of(parts: &[MessagePart]) -> String {
    parts
        .iter()
        .filter_map(MessagePart::text_content)
        .collect::<Vec<_>>()
        .join("")
}
