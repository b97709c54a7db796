//! LLM crate wrapper implementing [`ChatProvider`].
//!
//! [`LlmChatProvider`] stores backend configuration and builds an llm
//! provider per request, bound to the request's model. Constructing one
//! performs no I/O and does not validate credentials; bad keys surface as
//! upstream errors on the first call.

use async_trait::async_trait;
use futures_util::StreamExt;
use llm::LLMProvider;
use llm::builder::{LLMBackend, LLMBuilder};
use tracing::instrument;

use crate::convert::{from_llm_tool_calls, from_llm_usage, to_llm_messages};
use crate::types::{ChatEvent, ChatOptions, ChatResponse, FinishReason, Message};
use crate::{GatewayError, Result};

use super::traits::{ChatProvider, ChatStream};

/// Azure OpenAI REST API version used when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Wraps llm crate provider configuration to implement our traits.
///
/// # Example
///
/// ```ignore
/// use llm::builder::LLMBackend;
/// use byok_gateway::providers::LlmChatProvider;
///
/// let provider = LlmChatProvider::new(LLMBackend::Anthropic, Some("sk-ant-..."), "anthropic");
/// ```
pub struct LlmChatProvider {
    backend: LLMBackend,
    api_key: Option<String>,
    name: String,
    /// Endpoint override (OpenAI-compatible hosts, Azure resource URL)
    base_url: Option<String>,
    /// Azure API version (only used for the Azure backend)
    api_version: Option<String>,
}

impl LlmChatProvider {
    /// Create a new LlmChatProvider with the given backend and API key.
    ///
    /// # Arguments
    ///
    /// * `backend` - The LLM backend to use (OpenAI, Anthropic, ...)
    /// * `api_key` - API key for the backend (`None` for keyless access)
    /// * `name` - Name for logging/metrics (usually the provider slug)
    pub fn new(
        backend: LLMBackend,
        api_key: Option<impl Into<String>>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            api_key: api_key.map(|k| k.into()),
            name: name.into(),
            base_url: None,
            api_version: None,
        }
    }

    /// Azure OpenAI client for `https://<resource>.openai.azure.com/`.
    ///
    /// The request's model is used as the deployment name.
    pub fn azure(api_key: impl Into<String>, resource_name: &str, name: impl Into<String>) -> Self {
        Self::new(LLMBackend::AzureOpenAI, Some(api_key), name)
            .base_url(azure_base_url(resource_name))
            .api_version(DEFAULT_AZURE_API_VERSION)
    }

    /// Override the endpoint base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the Azure API version.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Build an llm provider configured for the given options.
    fn build_provider(
        &self,
        options: &ChatOptions,
        system_prompt: Option<&str>,
    ) -> Result<Box<dyn LLMProvider>> {
        let mut builder = LLMBuilder::new()
            .backend(self.backend.clone())
            .model(&options.model);
        if let Some(ref key) = self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(ref url) = self.base_url {
            builder = builder.base_url(url.clone());
        }

        if self.backend == LLMBackend::AzureOpenAI {
            builder = builder.deployment_id(&options.model);
            if let Some(ref version) = self.api_version {
                builder = builder.api_version(version.clone());
            }
        }

        if let Some(sys) = system_prompt {
            builder = builder.system(sys);
        }
        if let Some(max) = options.max_tokens {
            builder = builder.max_tokens(max as u32);
        }

        builder
            .build()
            .map_err(|e| GatewayError::Llm(e.to_string()))
    }
}

/// Base URL of an Azure OpenAI resource.
pub fn azure_base_url(resource_name: &str) -> String {
    format!("https://{resource_name}.openai.azure.com/")
}

#[async_trait]
impl ChatProvider for LlmChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "llm.chat", skip(self, messages, options), fields(model = %options.model, provider = %self.name))]
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let (system_prompt, llm_messages) = to_llm_messages(messages);
        let provider = self.build_provider(options, system_prompt.as_deref())?;

        let response = provider
            .chat(&llm_messages)
            .await
            .map_err(GatewayError::from)?;

        let tool_calls = response
            .tool_calls()
            .map(|tc| from_llm_tool_calls(&tc))
            .unwrap_or_default();

        let usage = response.usage().map(|u| from_llm_usage(&u));

        let finish_reason = if !tool_calls.is_empty() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };

        Ok(ChatResponse {
            content: response.text().unwrap_or_default(),
            reasoning: response.thinking(),
            tool_calls,
            usage,
            model: Some(options.model.clone()),
            finish_reason,
        })
    }

    #[instrument(name = "llm.chat_stream", skip(self, messages, options), fields(model = %options.model, provider = %self.name))]
    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatStream> {
        let (system_prompt, llm_messages) = to_llm_messages(messages);
        let provider = self.build_provider(options, system_prompt.as_deref())?;

        let stream = provider
            .chat_stream_with_tools(&llm_messages, provider.tools())
            .await
            .map_err(GatewayError::from)?;

        let converted = stream.map(|result| {
            result
                .map(|chunk| match chunk {
                    llm::chat::StreamChunk::Text(text) => ChatEvent::Content(text),
                    llm::chat::StreamChunk::ToolUseStart { index, id, name } => {
                        ChatEvent::ToolCallStart { index, id, name }
                    }
                    llm::chat::StreamChunk::ToolUseInputDelta {
                        index,
                        partial_json,
                    } => ChatEvent::ToolCallDelta {
                        index,
                        arguments: partial_json,
                    },
                    llm::chat::StreamChunk::ToolUseComplete { index, .. } => {
                        ChatEvent::ToolCallEnd { index }
                    }
                    llm::chat::StreamChunk::Thinking(text) => ChatEvent::Reasoning(text),
                    llm::chat::StreamChunk::Done { .. } => ChatEvent::Done,
                })
                .map_err(GatewayError::from)
        });

        Ok(Box::pin(converted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let provider = LlmChatProvider::new(LLMBackend::OpenAI, Some("test-key"), "openai");
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_azure_client_targets_resource() {
        let provider = LlmChatProvider::azure("az-key", "contoso", "azure");
        assert_eq!(
            provider.base_url.as_deref(),
            Some("https://contoso.openai.azure.com/")
        );
        assert_eq!(
            provider.api_version.as_deref(),
            Some(DEFAULT_AZURE_API_VERSION)
        );
        assert!(provider.backend == LLMBackend::AzureOpenAI);
    }

    #[test]
    fn test_builds_client_from_request_options() {
        let provider = LlmChatProvider::new(LLMBackend::Anthropic, Some("key"), "anthropic");
        let options = ChatOptions::new("claude-sonnet-4").max_tokens(2048);
        assert!(provider.build_provider(&options, Some("be brief")).is_ok());
    }
}
