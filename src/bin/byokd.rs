//! byokd: BYOK chat gateway daemon.
//!
//! Serves the chat endpoints over HTTP from an in-process store seeded
//! from the configuration file.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use byok_gateway::gateway::Gateway;
use byok_gateway::server::config::{Config, Secrets};
use byok_gateway::server::{AppState, TrustedHeaderAuthenticator, run_server};
use byok_gateway::store::MemoryStore;
use byok_gateway::{ChatService, GatewayError};

/// byokd, the bring-your-own-key chat completion gateway.
#[derive(Parser)]
#[command(name = "byokd")]
#[command(version = byok_gateway::PKG_VERSION)]
#[command(about = "BYOK chat completion gateway daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "BYOK_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Arc::new(Secrets::load()?);

    let service = build_service(&config, secrets)?;

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| GatewayError::Configuration(format!("Invalid address: {e}")))?;

    info!(
        version = byok_gateway::version_string(),
        %addr,
        providers = config.providers.len(),
        models = config.models.len(),
        "byokd starting"
    );

    let state = Arc::new(AppState::new(
        Arc::new(service),
        Arc::new(TrustedHeaderAuthenticator::new(&config.auth.user_header)),
    ));
    run_server(addr, state).await?;

    Ok(())
}

/// Build the [`ChatService`] from configuration.
fn build_service(config: &Config, secrets: Arc<Secrets>) -> Result<ChatService, GatewayError> {
    let store = Arc::new(MemoryStore::new());
    config.seed(&store)?;

    let endpoint = config.hosted.endpoint().ok_or_else(|| {
        GatewayError::Configuration(
            "[hosted] needs base_url or account_id for the default model".into(),
        )
    })?;
    let token_key = Secrets::hosted_token_key(&config.app.name);
    let token = secrets.lookup(&token_key).unwrap_or_else(|| {
        warn!(key = %token_key, "hosted API token not set");
        String::new()
    });

    Gateway::builder()
        .store(store)
        .secrets(secrets)
        .app_name(&config.app.name)
        .hosted_endpoint(endpoint, token)
        .default_model(&config.hosted.default_model)
        .title_model(&config.hosted.title_model)
        .stream_buffer(config.server.stream_buffer)
        .build()
}
