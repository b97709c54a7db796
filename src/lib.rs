//! byok-gateway - Bring-your-own-key chat completion gateway
//!
//! Takes one conversation turn, resolves the requested model to its
//! provider, binds a client with the caller's stored credentials (falling
//! back to a hosted default model), optionally extracts inline reasoning,
//! persists both sides of the turn, and returns a batch or streaming
//! response.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use byok_gateway::{Gateway, TurnFlags, TurnOutcome, TurnRequest, UiMessage, MessagePart, MessageRole};
//! use byok_gateway::store::MemoryStore;
//! use byok_gateway::credentials::EnvSecretStore;
//!
//! #[tokio::main]
//! async fn main() -> byok_gateway::Result<()> {
//!     let service = Gateway::builder()
//!         .store(Arc::new(MemoryStore::new()))
//!         .secrets(Arc::new(EnvSecretStore))
//!         .hosted_endpoint(byok_gateway::gateway::workers_ai_base_url("account"), "token")
//!         .build()?;
//!
//!     let conversation = service.create_conversation("user-1").await?;
//!     let outcome = service
//!         .handle_turn(TurnRequest {
//!             conversation_id: conversation.id,
//!             user_id: "user-1".into(),
//!             message: UiMessage {
//!                 id: None,
//!                 role: MessageRole::User,
//!                 parts: vec![MessagePart::text("What is the capital of France?")],
//!             },
//!             model_id: "gpt-4.1-mini".into(),
//!             flags: TurnFlags { stream: false, reasoning: false },
//!             geo: Default::default(),
//!         })
//!         .await?;
//!
//!     if let TurnOutcome::Completed { text, .. } = outcome {
//!         println!("{text}");
//!     }
//!     Ok(())
//! }
//! ```

mod convert;
pub mod chat;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod registry;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use chat::{ChatService, TurnFlags, TurnOutcome, TurnRequest};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayBuilder};
pub use providers::{ChatProvider, RetryConfig};
pub use version::{PKG_VERSION, version_string};

pub use types::{
    ChatEvent, ChatOptions, ChatResponse, Conversation, FinishReason, Message, MessagePart,
    MessageRole, ModelRecord, ProviderRecord, Role, StoredMessage, ToolCall, UiMessage, Usage,
};
