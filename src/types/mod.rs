//! Public types crossing the gateway boundary.

mod message;
mod options;
mod parts;
mod records;
mod response;
mod tool;

pub use message::{Message, Role};
pub use options::ChatOptions;
pub use parts::{MessagePart, MessageRole, UiMessage};
pub use records::{
    AuthType, Conversation, ConversationStatus, DEFAULT_TITLE_PREFIX, ModelCapabilities,
    ModelRecord, ModelStatus, NewMessage, ProviderRecord, ResolvedModel, StoredMessage,
};
pub use response::{ChatEvent, ChatResponse, FinishReason, Usage};
pub use tool::ToolCall;
