//! Generation clients and the decorators layered over them.
//!
//! Concrete upstream clients are built on the llm crate ([`LlmChatProvider`]).
//! The [`AdapterSelector`] binds one to a resolved model and wraps it in
//! [`RetryingChatProvider`]; [`ReasoningProvider`] is layered on top when the
//! caller asked to see reasoning.

pub mod llm_chat;
pub mod reasoning;
pub mod retry;
pub mod selector;
pub mod traits;

pub use llm_chat::LlmChatProvider;
pub use reasoning::ReasoningProvider;
pub use retry::{RetryConfig, RetryingChatProvider};
pub use selector::{AdapterFactory, AdapterSelector, BoundModel, HOSTED_SLUG};
pub use traits::{ChatProvider, ChatStream};
