//! The generation interface every upstream adapter exposes.
//!
//! Adapters, decorators (retry, reasoning extraction) and test fakes all
//! implement [`ChatProvider`], so the orchestrator never knows which of them
//! it is talking to.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::Result;
use crate::types::{ChatEvent, ChatOptions, ChatResponse, Message};

/// Boxed stream of chat events.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>;

/// Provider for multi-turn chat.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Non-streaming chat completion.
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse>;

    /// Streaming chat completion.
    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions)
    -> Result<ChatStream>;
}
