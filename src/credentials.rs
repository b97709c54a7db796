//! Credential resolution from a flat, string-keyed secret store.
//!
//! Well-known keys follow `<APP>__PROVIDERS__<PROVIDER>_<FIELD>`, e.g.
//! `BYOK__PROVIDERS__OPENAI_API_KEY`. Secrets are read on every request and
//! never cached; a missing key is an ordinary `None`, not an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::types::ProviderRecord;

/// Field suffix for provider API keys.
pub const API_KEY: &str = "API_KEY";
/// Field suffix for provider base URL overrides.
pub const BASE_URL: &str = "BASE_URL";
/// Field suffix for managed-deployment resource names.
pub const RESOURCE_NAME: &str = "RESOURCE_NAME";

/// Read-only access to stored secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;
}

/// Secrets taken from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Mutable in-memory secret store.
#[derive(Default)]
pub struct MemorySecretStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

/// Credentials resolved for one provider on one request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub resource_name: Option<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("resource_name", &self.resource_name)
            .finish()
    }
}

/// Maps providers to their namespaced secret keys and reads them.
#[derive(Clone)]
pub struct CredentialResolver {
    secrets: Arc<dyn SecretStore>,
    namespace: String,
}

impl CredentialResolver {
    /// `namespace` is the `<APP>` prefix of every key.
    pub fn new(secrets: Arc<dyn SecretStore>, namespace: impl Into<String>) -> Self {
        Self {
            secrets,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Secret key for `field` of the provider identified by `slug`.
    ///
    /// ```
    /// # use byok_gateway::credentials::{CredentialResolver, EnvSecretStore, API_KEY};
    /// # use std::sync::Arc;
    /// let resolver = CredentialResolver::new(Arc::new(EnvSecretStore), "BYOK");
    /// assert_eq!(resolver.key("azure-openai", API_KEY), "BYOK__PROVIDERS__AZURE_OPENAI_API_KEY");
    /// ```
    pub fn key(&self, slug: &str, field: &str) -> String {
        format!(
            "{}__PROVIDERS__{}_{}",
            self.namespace,
            env_segment(slug),
            field
        )
    }

    /// Read a single secret by full key.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.secrets.get(key).await
    }

    /// Resolve everything an adapter factory may need for `provider`.
    ///
    /// The provider row's own `base_url` / `resource_name` are used when no
    /// secret overrides them.
    pub async fn resolve(&self, provider: &ProviderRecord) -> ProviderCredentials {
        let api_key = self.get(&self.key(&provider.slug, API_KEY)).await;
        let base_url = self
            .get(&self.key(&provider.slug, BASE_URL))
            .await
            .or_else(|| provider.base_url.clone());
        let resource_name = self
            .get(&self.key(&provider.slug, RESOURCE_NAME))
            .await
            .or_else(|| provider.resource_name.clone());

        debug!(
            provider = %provider.slug,
            has_api_key = api_key.is_some(),
            has_base_url = base_url.is_some(),
            has_resource_name = resource_name.is_some(),
            "resolved provider credentials"
        );

        ProviderCredentials {
            api_key,
            base_url,
            resource_name,
        }
    }
}

fn env_segment(slug: &str) -> String {
    slug.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(slug: &str) -> ProviderRecord {
        ProviderRecord {
            id: format!("p-{slug}"),
            slug: slug.into(),
            name: slug.into(),
            base_url: None,
            auth_type: Default::default(),
            resource_name: None,
        }
    }

    #[test]
    fn keys_follow_namespace_pattern() {
        let resolver = CredentialResolver::new(Arc::new(MemorySecretStore::new()), "APP");
        assert_eq!(
            resolver.key("openai", API_KEY),
            "APP__PROVIDERS__OPENAI_API_KEY"
        );
        assert_eq!(
            resolver.key("azure", RESOURCE_NAME),
            "APP__PROVIDERS__AZURE_RESOURCE_NAME"
        );
        assert_eq!(
            resolver.key("workers-ai", BASE_URL),
            "APP__PROVIDERS__WORKERS_AI_BASE_URL"
        );
    }

    #[tokio::test]
    async fn missing_keys_resolve_to_none() {
        let resolver = CredentialResolver::new(Arc::new(MemorySecretStore::new()), "APP");
        let creds = resolver.resolve(&provider("anthropic")).await;
        assert_eq!(creds, ProviderCredentials::default());
    }

    #[tokio::test]
    async fn secrets_override_provider_row() {
        let secrets = MemorySecretStore::new()
            .with("APP__PROVIDERS__AZURE_API_KEY", "az-key")
            .with("APP__PROVIDERS__AZURE_RESOURCE_NAME", "from-secret");
        let resolver = CredentialResolver::new(Arc::new(secrets), "APP");

        let mut row = provider("azure");
        row.resource_name = Some("from-row".into());
        row.base_url = Some("https://row.example".into());

        let creds = resolver.resolve(&row).await;
        assert_eq!(creds.api_key.as_deref(), Some("az-key"));
        assert_eq!(creds.resource_name.as_deref(), Some("from-secret"));
        assert_eq!(creds.base_url.as_deref(), Some("https://row.example"));
    }

    #[tokio::test]
    async fn reads_are_not_cached() {
        let secrets = Arc::new(MemorySecretStore::new());
        let resolver = CredentialResolver::new(secrets.clone(), "APP");
        let row = provider("openai");

        assert!(resolver.resolve(&row).await.api_key.is_none());
        secrets.set("APP__PROVIDERS__OPENAI_API_KEY", "sk-late");
        assert_eq!(
            resolver.resolve(&row).await.api_key.as_deref(),
            Some("sk-late")
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let creds = ProviderCredentials {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("redacted"));
    }
}
