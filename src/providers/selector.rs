//! Provider adapter selection as a slug → factory table.
//!
//! A factory turns a resolved `{model, provider}` pair and its credentials
//! into a client bound to that upstream model. Factories return `None` when a
//! credential they need is missing; the selector then falls back to the
//! hosted default model. Selection never fails.
//!
//! ```text
//! provider slug ──► factories[slug] ──► Some(client) ──► retry wrap ──► BoundModel
//!                        │                  │
//!                    no entry             None
//!                        └────────┬─────────┘
//!                                 ▼
//!                        hosted default model (warn + counter)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::credentials::ProviderCredentials;
use crate::telemetry;
use crate::types::ResolvedModel;

use super::reasoning::ReasoningProvider;
use super::retry::{RetryConfig, RetryingChatProvider};
use super::traits::ChatProvider;

/// Slug of the platform-hosted inference binding.
pub const HOSTED_SLUG: &str = "workers-ai";

/// Builds a client for one provider slug.
pub type AdapterFactory = Arc<
    dyn Fn(&ResolvedModel, &ProviderCredentials) -> Option<Arc<dyn ChatProvider>> + Send + Sync,
>;

/// A generation client bound to one upstream model.
#[derive(Clone)]
pub struct BoundModel {
    pub provider: Arc<dyn ChatProvider>,
    /// Upstream model identifier sent with every call.
    pub model: String,
    /// Slug of the provider actually serving the request.
    pub provider_slug: String,
    /// The requested provider could not be honoured.
    pub fell_back: bool,
}

impl BoundModel {
    /// Wrap the client with reasoning extraction.
    pub fn with_reasoning(self) -> Self {
        Self {
            provider: Arc::new(ReasoningProvider::new(self.provider)),
            ..self
        }
    }
}

impl fmt::Debug for BoundModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundModel")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("provider_slug", &self.provider_slug)
            .field("fell_back", &self.fell_back)
            .finish()
    }
}

/// Maps provider slugs to adapter factories.
pub struct AdapterSelector {
    factories: HashMap<String, AdapterFactory>,
    hosted: Arc<dyn ChatProvider>,
    default_model: String,
    retry: RetryConfig,
}

impl AdapterSelector {
    /// A selector with no factories; every request falls back to `hosted`
    /// running `default_model`.
    pub fn new(
        hosted: Arc<dyn ChatProvider>,
        default_model: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            factories: HashMap::new(),
            hosted,
            default_model: default_model.into(),
            retry,
        }
    }

    /// Register the built-in adapters: the hosted binding plus whichever
    /// external backends were compiled in.
    pub fn with_default_adapters(mut self) -> Self {
        let hosted = self.hosted.clone();
        self.register(
            HOSTED_SLUG,
            Arc::new(move |_: &ResolvedModel, _: &ProviderCredentials| Some(hosted.clone())),
        );
        #[cfg(feature = "openai")]
        self.register("openai", Arc::new(adapters::openai));
        #[cfg(feature = "anthropic")]
        self.register("anthropic", Arc::new(adapters::anthropic));
        #[cfg(feature = "azure")]
        self.register("azure", Arc::new(adapters::azure));
        self
    }

    /// Add or replace the factory for `slug`.
    pub fn register(&mut self, slug: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(slug.into(), factory);
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Bind a client for `resolved`, falling back to the hosted default.
    pub fn select(&self, resolved: &ResolvedModel, credentials: &ProviderCredentials) -> BoundModel {
        let slug = resolved.provider.slug.as_str();
        match self.factories.get(slug) {
            Some(factory) => match factory(resolved, credentials) {
                Some(client) => {
                    debug!(provider = slug, model = %resolved.model.slug, "adapter selected");
                    return BoundModel {
                        provider: self.wrap(client),
                        model: resolved.model.slug.clone(),
                        provider_slug: slug.to_owned(),
                        fell_back: false,
                    };
                }
                None => warn!(
                    provider = slug,
                    model = %resolved.model.slug,
                    fallback = %self.default_model,
                    "provider credentials incomplete, using hosted default model"
                ),
            },
            None => warn!(
                provider = slug,
                model = %resolved.model.slug,
                fallback = %self.default_model,
                "no adapter registered for provider, using hosted default model"
            ),
        }

        metrics::counter!(telemetry::PROVIDER_FALLBACK_TOTAL, "requested" => slug.to_owned())
            .increment(1);
        self.fallback()
    }

    /// The hosted default model.
    pub fn fallback(&self) -> BoundModel {
        BoundModel {
            provider: self.wrap(self.hosted.clone()),
            model: self.default_model.clone(),
            provider_slug: HOSTED_SLUG.to_owned(),
            fell_back: true,
        }
    }

    /// The hosted binding bound to an arbitrary model (title synthesis).
    pub fn hosted(&self, model: impl Into<String>) -> BoundModel {
        BoundModel {
            provider: self.wrap(self.hosted.clone()),
            model: model.into(),
            provider_slug: HOSTED_SLUG.to_owned(),
            fell_back: false,
        }
    }

    fn wrap(&self, client: Arc<dyn ChatProvider>) -> Arc<dyn ChatProvider> {
        Arc::new(RetryingChatProvider::new(client, self.retry.clone()))
    }
}

/// Factories for the external backends.
#[cfg(any(feature = "openai", feature = "anthropic", feature = "azure"))]
pub mod adapters {
    use std::sync::Arc;

    use llm::builder::LLMBackend;

    use crate::credentials::ProviderCredentials;
    use crate::providers::{ChatProvider, LlmChatProvider};
    use crate::types::ResolvedModel;

    /// OpenAI, or any OpenAI-compatible endpoint when a base URL is set.
    #[cfg(feature = "openai")]
    pub fn openai(
        resolved: &ResolvedModel,
        creds: &ProviderCredentials,
    ) -> Option<Arc<dyn ChatProvider>> {
        let key = creds.api_key.as_deref()?;
        let mut client = LlmChatProvider::new(LLMBackend::OpenAI, Some(key), &resolved.provider.slug);
        if let Some(url) = creds.base_url.as_deref() {
            client = client.base_url(url);
        }
        Some(Arc::new(client))
    }

    #[cfg(feature = "anthropic")]
    pub fn anthropic(
        resolved: &ResolvedModel,
        creds: &ProviderCredentials,
    ) -> Option<Arc<dyn ChatProvider>> {
        let key = creds.api_key.as_deref()?;
        Some(Arc::new(LlmChatProvider::new(
            LLMBackend::Anthropic,
            Some(key),
            &resolved.provider.slug,
        )))
    }

    /// Azure-hosted OpenAI; the model slug names the deployment.
    #[cfg(feature = "azure")]
    pub fn azure(
        resolved: &ResolvedModel,
        creds: &ProviderCredentials,
    ) -> Option<Arc<dyn ChatProvider>> {
        let key = creds.api_key.as_deref()?;
        let resource = creds.resource_name.as_deref()?;
        Some(Arc::new(LlmChatProvider::azure(
            key,
            resource,
            &resolved.provider.slug,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AuthType, ChatOptions, ChatResponse, Message, ModelCapabilities, ModelRecord, ModelStatus,
        ProviderRecord,
    };
    use crate::providers::ChatStream;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl ChatProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn chat(&self, _: &[Message], _: &ChatOptions) -> crate::Result<ChatResponse> {
            Err(crate::GatewayError::NoProvider)
        }

        async fn chat_stream(&self, _: &[Message], _: &ChatOptions) -> crate::Result<ChatStream> {
            Err(crate::GatewayError::NoProvider)
        }
    }

    fn resolved(provider_slug: &str, model_slug: &str) -> ResolvedModel {
        ResolvedModel {
            model: ModelRecord {
                id: "m".into(),
                slug: model_slug.into(),
                name: model_slug.into(),
                provider_id: "p".into(),
                capabilities: ModelCapabilities::default(),
                status: ModelStatus::Active,
                is_deleted: false,
            },
            provider: ProviderRecord {
                id: "p".into(),
                slug: provider_slug.into(),
                name: provider_slug.into(),
                base_url: None,
                auth_type: AuthType::ApiKey,
                resource_name: None,
            },
        }
    }

    fn selector() -> AdapterSelector {
        AdapterSelector::new(Arc::new(Named("hosted")), "@cf/default", RetryConfig::disabled())
    }

    #[test]
    fn unmapped_slug_falls_back_deterministically() {
        let selector = selector();
        for _ in 0..3 {
            let bound = selector.select(&resolved("mystery", "m-1"), &ProviderCredentials::default());
            assert!(bound.fell_back);
            assert_eq!(bound.model, "@cf/default");
            assert_eq!(bound.provider_slug, HOSTED_SLUG);
        }
    }

    #[test]
    fn registered_factory_binds_model_slug() {
        let mut selector = selector();
        selector.register(
            "custom",
            Arc::new(|_: &ResolvedModel, _: &ProviderCredentials| {
                Some(Arc::new(Named("custom")) as Arc<dyn ChatProvider>)
            }),
        );
        let bound = selector.select(&resolved("custom", "big-model"), &ProviderCredentials::default());
        assert!(!bound.fell_back);
        assert_eq!(bound.model, "big-model");
        assert_eq!(bound.provider.name(), "custom");
    }

    #[test]
    fn hosted_slug_needs_no_credentials() {
        let selector = selector().with_default_adapters();
        let bound = selector.select(
            &resolved(HOSTED_SLUG, "@cf/meta/llama"),
            &ProviderCredentials::default(),
        );
        assert!(!bound.fell_back);
        assert_eq!(bound.model, "@cf/meta/llama");
        assert_eq!(bound.provider.name(), "hosted");
    }

    #[cfg(feature = "openai")]
    #[test]
    fn missing_api_key_falls_back() {
        let selector = selector().with_default_adapters();
        let bound = selector.select(&resolved("openai", "gpt-4.1-mini"), &ProviderCredentials::default());
        assert!(bound.fell_back);

        let creds = ProviderCredentials {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let bound = selector.select(&resolved("openai", "gpt-4.1-mini"), &creds);
        assert!(!bound.fell_back);
        assert_eq!(bound.provider.name(), "openai");
    }

    #[cfg(feature = "azure")]
    #[test]
    fn azure_requires_resource_name() {
        let selector = selector().with_default_adapters();
        let key_only = ProviderCredentials {
            api_key: Some("az".into()),
            ..Default::default()
        };
        assert!(selector.select(&resolved("azure", "gpt-4o"), &key_only).fell_back);

        let full = ProviderCredentials {
            resource_name: Some("contoso".into()),
            ..key_only
        };
        assert!(!selector.select(&resolved("azure", "gpt-4o"), &full).fell_back);
    }
}
