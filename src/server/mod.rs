//! HTTP surface of the gateway.
//!
//! - `POST   /api/chat`                   create a conversation
//! - `GET    /api/chat/:conversation_id`  load a conversation
//! - `POST   /api/chat/:conversation_id`  run a chat turn (SSE or JSON)
//! - `DELETE /api/chat/:conversation_id`  soft-delete a conversation
//! - `GET    /health`

pub mod auth;
pub mod config;
pub mod handlers;
pub mod stream;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chat::ChatService;
use crate::{GatewayError, Result};

pub use auth::{Authenticator, Caller, TrustedHeaderAuthenticator};

/// Shared handler state.
pub struct AppState {
    pub service: Arc<ChatService>,
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(service: Arc<ChatService>, auth: Arc<dyn Authenticator>) -> Self {
        Self { service, auth }
    }
}

/// A [`GatewayError`] rendered as `{success: false, error}`.
///
/// Rejections map to 4xx with a short reason. Everything else is a 500
/// carrying only the handler's generic message.
#[derive(Debug)]
pub struct ApiError {
    error: GatewayError,
    message: &'static str,
}

impl ApiError {
    pub fn with_message(error: GatewayError, message: &'static str) -> Self {
        Self { error, message }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::ConversationNotFound => StatusCode::NOT_FOUND,
            GatewayError::InvalidModelConfiguration(_) | GatewayError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match &self.error {
            GatewayError::Unauthenticated => "Unauthorized".to_owned(),
            GatewayError::ConversationNotFound => "Conversation not found".to_owned(),
            GatewayError::InvalidModelConfiguration(_) => "Invalid model configuration".to_owned(),
            GatewayError::InvalidRequest(reason) => format!("Invalid request: {reason}"),
            _ => self.message.to_owned(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self::with_message(error, crate::server::stream::GENERIC_ERROR)
    }
}

/// Malformed or mistyped request bodies are client errors, answered in JSON.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from(GatewayError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::create_chat))
        .route(
            "/api/chat/:conversation_id",
            post(handlers::post_chat)
                .get(handlers::get_chat)
                .delete(handlers::delete_chat),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the gateway until the listener fails.
pub async fn run_server(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Configuration(format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| GatewayError::Http(e.to_string()))
}
