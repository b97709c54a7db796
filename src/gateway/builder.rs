//! Builder for wiring a [`ChatService`].

use std::sync::Arc;

use crate::chat::{ChatService, DEFAULT_STREAM_BUFFER};
use crate::credentials::{CredentialResolver, EnvSecretStore, SecretStore};
use crate::providers::{AdapterFactory, AdapterSelector, ChatProvider, RetryConfig};
use crate::store::{ChatStore, MemoryStore};
use crate::{GatewayError, Result};

/// Hosted model used when a requested provider cannot be honoured.
pub const DEFAULT_HOSTED_MODEL: &str = "@cf/deepseek-ai/deepseek-r1-distill-qwen-32b";
/// Low-cost hosted model used for conversation titles.
pub const DEFAULT_TITLE_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";
/// Default secret namespace.
pub const DEFAULT_APP_NAME: &str = "BYOK";

/// OpenAI-compatible endpoint of the hosted inference account.
pub fn workers_ai_base_url(account_id: &str) -> String {
    format!("https://api.cloudflare.com/client/v4/accounts/{account_id}/ai/v1/")
}

/// Main entry point for creating gateway instances.
pub struct Gateway;

impl Gateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct GatewayBuilder {
    store: Option<Arc<dyn ChatStore>>,
    secrets: Option<Arc<dyn SecretStore>>,
    app_name: String,
    hosted: Option<Arc<dyn ChatProvider>>,
    hosted_endpoint: Option<(String, String)>,
    default_model: String,
    title_model: String,
    retry: RetryConfig,
    default_adapters: bool,
    adapters: Vec<(String, AdapterFactory)>,
    stream_buffer: usize,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            secrets: None,
            app_name: DEFAULT_APP_NAME.to_owned(),
            hosted: None,
            hosted_endpoint: None,
            default_model: DEFAULT_HOSTED_MODEL.to_owned(),
            title_model: DEFAULT_TITLE_MODEL.to_owned(),
            retry: RetryConfig::default(),
            default_adapters: true,
            adapters: Vec::new(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Persistence backend (default: an empty [`MemoryStore`]).
    pub fn store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Secret backend (default: process environment).
    pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// `<APP>` prefix of every secret key.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Use an existing client as the hosted inference binding.
    pub fn hosted_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.hosted = Some(provider);
        self
    }

    /// Reach the hosted binding through its OpenAI-compatible endpoint.
    pub fn hosted_endpoint(mut self, base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        self.hosted_endpoint = Some((base_url.into(), api_token.into()));
        self
    }

    /// Model served when the requested provider is unavailable.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn title_model(mut self, model: impl Into<String>) -> Self {
        self.title_model = model.into();
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Skip the built-in openai/anthropic/azure/workers-ai adapters.
    pub fn without_default_adapters(mut self) -> Self {
        self.default_adapters = false;
        self
    }

    /// Add or replace the adapter for a provider slug.
    pub fn register_adapter(mut self, slug: impl Into<String>, factory: AdapterFactory) -> Self {
        self.adapters.push((slug.into(), factory));
        self
    }

    /// Events buffered between upstream and client while streaming.
    pub fn stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size;
        self
    }

    fn hosted_client(&mut self) -> Result<Arc<dyn ChatProvider>> {
        if let Some(provider) = self.hosted.take() {
            return Ok(provider);
        }
        #[cfg(feature = "openai")]
        if let Some((base_url, token)) = self.hosted_endpoint.take() {
            use crate::providers::{HOSTED_SLUG, LlmChatProvider};
            use llm::builder::LLMBackend;

            return Ok(Arc::new(
                LlmChatProvider::new(LLMBackend::OpenAI, Some(token), HOSTED_SLUG)
                    .base_url(base_url),
            ));
        }
        Err(GatewayError::NoProvider)
    }

    /// Build the chat service.
    ///
    /// Fails with [`GatewayError::NoProvider`] when no hosted binding was
    /// configured, since fallback must always have somewhere to go.
    pub fn build(mut self) -> Result<ChatService> {
        let hosted = self.hosted_client()?;
        if self.app_name.trim().is_empty() {
            return Err(GatewayError::Configuration("app name must not be empty".into()));
        }

        let mut selector = AdapterSelector::new(hosted, self.default_model, self.retry);
        if self.default_adapters {
            selector = selector.with_default_adapters();
        }
        for (slug, factory) in self.adapters {
            selector.register(slug, factory);
        }
        let title_model = selector.hosted(self.title_model);

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let secrets = self.secrets.unwrap_or_else(|| Arc::new(EnvSecretStore));
        let credentials = CredentialResolver::new(secrets, self.app_name);

        Ok(ChatService::new(
            store,
            credentials,
            selector,
            title_model,
            self.stream_buffer,
        ))
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
