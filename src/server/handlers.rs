//! HTTP handlers for the chat endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::chat::{RequestGeo, TurnFlags, TurnOutcome, TurnRequest};
use crate::types::UiMessage;

use super::auth::Caller;
use super::stream::{UI_STREAM_HEADER, UI_STREAM_VERSION, UiMessageStream};
use super::{ApiError, AppState};

/// Body of `POST /api/chat/:conversation_id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub message: UiMessage,
    /// Client-side chat id; the path parameter is authoritative.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model_id: String,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `X-Stream: false` selects batch; `X-Reasoning: true` enables reasoning.
pub fn turn_flags(headers: &HeaderMap) -> TurnFlags {
    TurnFlags {
        stream: !header(headers, "x-stream").is_some_and(|v| v.eq_ignore_ascii_case("false")),
        reasoning: header(headers, "x-reasoning").is_some_and(|v| v.eq_ignore_ascii_case("true")),
    }
}

/// Location hints added by the edge network.
pub fn request_geo(headers: &HeaderMap) -> RequestGeo {
    let get = |name: &str| header(headers, name).map(str::to_owned);
    RequestGeo {
        city: get("cf-ipcity"),
        region: get("cf-region"),
        country: get("cf-ipcountry"),
        timezone: get("cf-timezone"),
        latitude: get("cf-iplatitude"),
        longitude: get("cf-iplongitude"),
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    let request = TurnRequest {
        conversation_id,
        user_id,
        message: body.message,
        model_id: body.model_id,
        flags: turn_flags(&headers),
        geo: request_geo(&headers),
    };

    match state.service.handle_turn(request).await {
        Ok(TurnOutcome::Completed { text, .. }) => {
            Json(json!({ "success": true, "text": text })).into_response()
        }
        Ok(TurnOutcome::Streaming(events)) => {
            let message_id = uuid::Uuid::new_v4().to_string();
            let body = UiMessageStream::new(events, message_id);
            (
                [(HeaderName::from_static(UI_STREAM_HEADER), UI_STREAM_VERSION)],
                Sse::new(body).keep_alive(KeepAlive::default()),
            )
                .into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conversation = state
        .service
        .create_conversation(&user_id)
        .await
        .map_err(|e| ApiError::with_message(e, "Failed to create conversation"))?;
    Ok(Json(json!({
        "success": true,
        "id": conversation.id,
        "title": conversation.title,
    })))
}

pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (conversation, messages) = state
        .service
        .load_conversation(&conversation_id, &user_id)
        .await
        .map_err(|e| ApiError::with_message(e, "Failed to load conversation"))?;
    Ok(Json(json!({
        "success": true,
        "conversation": conversation,
        "messages": messages,
    })))
}

pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .delete_conversation(&conversation_id, &user_id)
        .await
        .map_err(|e| ApiError::with_message(e, "Failed to delete conversation"))?;
    Ok(Json(json!({
        "success": true,
        "message": "Conversation deleted",
    })))
}
