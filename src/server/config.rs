//! Configuration loading for byokd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.byok/config.toml` (user)
//! 3. `/etc/byok/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.byok/secrets.toml` (user, must be 0600)
//! 2. `/etc/byok/secrets.toml` (system, must be 0600)
//!
//! The secrets file is a flat table of namespaced keys, e.g.
//! `BYOK__PROVIDERS__OPENAI_API_KEY = "sk-..."`. Keys absent from the file
//! are looked up in the process environment.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::credentials::SecretStore;
use crate::gateway::{DEFAULT_APP_NAME, DEFAULT_HOSTED_MODEL, DEFAULT_TITLE_MODEL};
use crate::store::MemoryStore;
use crate::types::{AuthType, ModelCapabilities, ModelRecord, ModelStatus, ProviderRecord};
use crate::{GatewayError, Result};

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub hosted: HostedConfig,
    #[serde(default)]
    pub providers: Vec<ProviderSeed>,
    #[serde(default)]
    pub models: Vec<ModelSeed>,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8787).
    #[serde(default = "default_address")]
    pub address: String,
    /// Events buffered per streaming response (default: 64).
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_stream_buffer() -> usize {
    crate::chat::DEFAULT_STREAM_BUFFER
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Secret namespace prefix (default: BYOK).
    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the caller id set by the fronting session layer.
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
        }
    }
}

fn default_user_header() -> String {
    "x-user-id".to_string()
}

/// Hosted inference binding.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedConfig {
    /// OpenAI-compatible endpoint; derived from `account_id` when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default = "default_hosted_model")]
    pub default_model: String,
    #[serde(default = "default_title_model")]
    pub title_model: String,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            account_id: None,
            default_model: default_hosted_model(),
            title_model: default_title_model(),
        }
    }
}

fn default_hosted_model() -> String {
    DEFAULT_HOSTED_MODEL.to_string()
}

fn default_title_model() -> String {
    DEFAULT_TITLE_MODEL.to_string()
}

impl HostedConfig {
    /// Endpoint of the hosted binding, if one can be derived.
    pub fn endpoint(&self) -> Option<String> {
        self.base_url.clone().or_else(|| {
            self.account_id
                .as_deref()
                .map(crate::gateway::workers_ai_base_url)
        })
    }
}

/// A provider row to load into the in-process store.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSeed {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub resource_name: Option<String>,
}

impl ProviderSeed {
    fn into_record(self) -> ProviderRecord {
        ProviderRecord {
            id: self.slug.clone(),
            name: self.name.unwrap_or_else(|| self.slug.clone()),
            slug: self.slug,
            base_url: self.base_url,
            auth_type: self.auth_type,
            resource_name: self.resource_name,
        }
    }
}

/// A model row to load into the in-process store.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSeed {
    pub slug: String,
    /// Slug of the owning provider.
    pub provider: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub has_reasoning: bool,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
    #[serde(default)]
    pub supports_tool_calling: bool,
    #[serde(default)]
    pub status: ModelStatus,
}

fn default_true() -> bool {
    true
}

impl ModelSeed {
    fn into_record(self) -> ModelRecord {
        ModelRecord {
            id: self.slug.clone(),
            name: self.name.unwrap_or_else(|| self.slug.clone()),
            slug: self.slug,
            provider_id: self.provider,
            capabilities: ModelCapabilities {
                has_reasoning: self.has_reasoning,
                supports_streaming: self.supports_streaming,
                supports_tool_calling: self.supports_tool_calling,
            },
            status: self.status,
            is_deleted: false,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.byok/config.toml`
    /// 3. `/etc/byok/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(GatewayError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".byok").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/byok/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(GatewayError::Configuration(
            "No config file found. Create ~/.byok/config.toml or /etc/byok/config.toml".to_string(),
        ))
    }

    /// Load the `[[providers]]` and `[[models]]` seeds into `store`.
    ///
    /// Every model must name a seeded provider.
    pub fn seed(&self, store: &MemoryStore) -> Result<()> {
        for provider in &self.providers {
            store.put_provider(provider.clone().into_record());
        }
        for model in &self.models {
            if !self.providers.iter().any(|p| p.slug == model.provider) {
                return Err(GatewayError::Configuration(format!(
                    "model {} references unknown provider {}",
                    model.slug, model.provider
                )));
            }
            store.put_model(model.clone().into_record());
        }
        Ok(())
    }
}

/// Secrets file with environment fallback.
///
/// The file is read again on every lookup, so keys added or rotated on disk
/// apply to the next request without a restart.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    path: Option<PathBuf>,
}

impl Secrets {
    /// Locate the secrets file in the standard locations and validate it once.
    ///
    /// Resolution order:
    /// 1. `~/.byok/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/byok/secrets.toml` (if exists, must be 0600)
    ///
    /// Without a file every lookup falls back to env vars.
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".byok").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/byok/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Use one secrets file, rejecting group/world-readable files.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::read_file(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
        })
    }

    fn read_file(path: &Path) -> Result<HashMap<String, String>> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| {
            GatewayError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    fn parse(content: &str) -> std::result::Result<HashMap<String, String>, toml::de::Error> {
        toml::from_str(content)
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(GatewayError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    fn file_value(&self, key: &str) -> Option<String> {
        let path = self.path.as_deref()?;
        match Self::read_file(path) {
            Ok(mut values) => values.remove(key),
            Err(e) => {
                warn!(error = %e, "secrets file unusable, falling back to environment");
                None
            }
        }
    }

    /// Value from the file as it is now, else from the environment.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.file_value(key)
            .or_else(|| std::env::var(key).ok())
            .filter(|v| !v.is_empty())
    }

    /// Key of the hosted binding's API token under `app`.
    pub fn hosted_token_key(app: &str) -> String {
        format!("{app}__HOSTED__API_TOKEN")
    }
}

#[async_trait]
impl SecretStore for Secrets {
    async fn get(&self, key: &str) -> Option<String> {
        let secrets = self.clone();
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || secrets.lookup(&key))
            .await
            .ok()
            .flatten()
    }
}
