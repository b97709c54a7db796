//! Shared fixtures: scripted providers and a seeded in-memory gateway.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream;
use parking_lot::Mutex;

use byok_gateway::credentials::{MemorySecretStore, ProviderCredentials};
use byok_gateway::providers::{AdapterFactory, ChatProvider, ChatStream};
use byok_gateway::store::{ChatStore, MemoryStore};
use byok_gateway::types::{
    AuthType, ModelCapabilities, ModelStatus, NewMessage, ResolvedModel,
};
use byok_gateway::{
    ChatEvent, ChatOptions, ChatResponse, ChatService, Conversation, Gateway, GatewayError,
    Message, MessagePart, MessageRole, ModelRecord, ProviderRecord, Result, RetryConfig,
    TurnFlags, TurnRequest, UiMessage, Usage,
};

pub const APP: &str = "APP";
pub const HOSTED_DEFAULT: &str = "@cf/test/default-r1";
pub const TITLE_MODEL: &str = "@cf/test/title";
pub const OPENAI_KEY: &str = "APP__PROVIDERS__OPENAI_API_KEY";

/// A provider that replays a fixed reply and records what it was asked.
pub struct ScriptedProvider {
    name: &'static str,
    reply: Mutex<String>,
    fail_with: Mutex<Option<fn() -> GatewayError>>,
    calls: AtomicU32,
    models: Mutex<Vec<String>>,
    last_prompt: Mutex<Vec<Message>>,
    last_options: Mutex<Option<ChatOptions>>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Mutex::new(reply.to_owned()),
            fail_with: Mutex::new(None),
            calls: AtomicU32::new(0),
            models: Mutex::new(Vec::new()),
            last_prompt: Mutex::new(Vec::new()),
            last_options: Mutex::new(None),
        })
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock() = reply.to_owned();
    }

    pub fn fail_with(&self, err: fn() -> GatewayError) {
        *self.fail_with.lock() = Some(err);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Models requested so far, in call order.
    pub fn models(&self) -> Vec<String> {
        self.models.lock().clone()
    }

    pub fn last_prompt(&self) -> Vec<Message> {
        self.last_prompt.lock().clone()
    }

    pub fn last_options(&self) -> Option<ChatOptions> {
        self.last_options.lock().clone()
    }

    fn record(&self, messages: &[Message], options: &ChatOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().push(options.model.clone());
        if options.model != TITLE_MODEL {
            *self.last_prompt.lock() = messages.to_vec();
            *self.last_options.lock() = Some(options.clone());
        }
        if let Some(err) = *self.fail_with.lock() {
            return Err(err());
        }
        Ok(self.reply.lock().clone())
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let content = self.record(messages, options)?;
        Ok(ChatResponse {
            content,
            model: Some(options.model.clone()),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            ..Default::default()
        })
    }

    /// Streams the reply split on `|`.
    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatStream> {
        let content = self.record(messages, options)?;
        let mut events: Vec<Result<ChatEvent>> = content
            .split('|')
            .map(|chunk| Ok(ChatEvent::Content(chunk.to_owned())))
            .collect();
        events.push(Ok(ChatEvent::Done));
        Ok(Box::pin(stream::iter(events)))
    }
}

/// Factory that serves `provider` only when an API key was resolved.
pub fn keyed_factory(provider: Arc<ScriptedProvider>) -> AdapterFactory {
    Arc::new(move |_: &ResolvedModel, creds: &ProviderCredentials| {
        creds
            .api_key
            .as_ref()
            .map(|_| provider.clone() as Arc<dyn ChatProvider>)
    })
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub secrets: Arc<MemorySecretStore>,
    pub hosted: Arc<ScriptedProvider>,
    pub openai: Arc<ScriptedProvider>,
    pub service: Arc<ChatService>,
}

fn provider(slug: &str) -> ProviderRecord {
    ProviderRecord {
        id: format!("prov-{slug}"),
        slug: slug.into(),
        name: slug.into(),
        base_url: None,
        auth_type: AuthType::ApiKey,
        resource_name: None,
    }
}

fn model(slug: &str, provider_slug: &str, has_reasoning: bool, is_deleted: bool) -> ModelRecord {
    ModelRecord {
        id: format!("model-{slug}"),
        slug: slug.into(),
        name: slug.into(),
        provider_id: format!("prov-{provider_slug}"),
        capabilities: ModelCapabilities {
            has_reasoning,
            supports_streaming: true,
            supports_tool_calling: false,
        },
        status: ModelStatus::Active,
        is_deleted,
    }
}

impl Fixture {
    /// Gateway with an `openai` adapter backed by a scripted provider.
    ///
    /// Models: `gpt-4.1-mini` (openai), `r1` (openai, reasoning),
    /// `retired` (openai, soft-deleted), `mystery-model` (unmapped provider).
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        for slug in ["openai", "mystery"] {
            store.put_provider(provider(slug));
        }
        store.put_model(model("gpt-4.1-mini", "openai", false, false));
        store.put_model(model("r1", "openai", true, false));
        store.put_model(model("retired", "openai", false, true));
        store.put_model(model("mystery-model", "mystery", false, false));

        let secrets = Arc::new(MemorySecretStore::new().with(OPENAI_KEY, "sk-test"));
        let hosted = ScriptedProvider::new("hosted", "Weekend trip planning");
        let openai = ScriptedProvider::new("openai", "Hello there!");

        let service = Gateway::builder()
            .store(store.clone())
            .secrets(secrets.clone())
            .app_name(APP)
            .hosted_provider(hosted.clone())
            .default_model(HOSTED_DEFAULT)
            .title_model(TITLE_MODEL)
            .retry(RetryConfig::disabled())
            .without_default_adapters()
            .register_adapter("openai", keyed_factory(openai.clone()))
            .build()
            .expect("gateway builds");

        Self {
            store,
            secrets,
            hosted,
            openai,
            service: Arc::new(service),
        }
    }

    /// A fresh conversation with the placeholder title.
    pub async fn conversation(&self, user: &str) -> Conversation {
        self.service.create_conversation(user).await.unwrap()
    }

    /// A conversation that already has a real title and `prior` messages.
    pub async fn titled_conversation(&self, user: &str, prior: &[(MessageRole, &str)]) -> Conversation {
        let mut conv = Conversation::new(user, Utc::now());
        conv.title = "Existing conversation".into();
        self.store.create_conversation(conv.clone()).await.unwrap();
        for (role, text) in prior {
            self.store
                .insert_message(NewMessage {
                    conversation_id: conv.id.clone(),
                    role: *role,
                    parts: vec![MessagePart::text(*text)],
                    details: None,
                })
                .await
                .unwrap();
        }
        conv
    }
}

pub fn user_message(text: &str) -> UiMessage {
    UiMessage {
        id: None,
        role: MessageRole::User,
        parts: vec![MessagePart::text(text)],
    }
}

pub fn turn(conversation_id: &str, user: &str, model_id: &str, flags: TurnFlags) -> TurnRequest {
    TurnRequest {
        conversation_id: conversation_id.into(),
        user_id: user.into(),
        message: user_message("hi"),
        model_id: model_id.into(),
        flags,
        geo: Default::default(),
    }
}

pub const BATCH: TurnFlags = TurnFlags {
    stream: false,
    reasoning: false,
};

pub const STREAM: TurnFlags = TurnFlags {
    stream: true,
    reasoning: false,
};

/// Wait for a detached task to change what `check` observes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
