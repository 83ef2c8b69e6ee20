//! HTTP route handlers for the aio-chat gateway API.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, GatewayFailure};
use crate::gateway::{ChatMessage, ConnectionInfo, GatewayEvent, GatewayRequest};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .route("/api/check-connection", get(check_connection))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "aio-chat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Chat request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Requested model, e.g. `groq:llama-3.1-70b-versatile`.
    #[serde(default)]
    pub model: String,
    /// Areas of expertise picked by the user.
    #[serde(default)]
    pub user_roles: Vec<String>,
}

impl From<ChatRequest> for GatewayRequest {
    fn from(request: ChatRequest) -> Self {
        GatewayRequest {
            messages: request.messages,
            model: request.model,
            role_hints: request.user_roles,
        }
    }
}

/// Error body returned when a chat request fails before streaming.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatErrorBody {
    /// Short summary.
    pub error: String,
    /// Upstream message.
    pub details: String,
    /// What the user can do about it.
    pub hint: String,
    /// Machine-readable failure reason.
    pub reason: GatewayFailure,
    /// RFC 3339 time of the failure.
    pub timestamp: String,
}

/// Connection check response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConnectionBody {
    /// Whether the upstream answered.
    pub success: bool,
    /// Summary on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Model details on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ConnectionInfo>,
    /// Upstream message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hint on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<GatewayFailure>,
    /// RFC 3339 time of the check.
    pub timestamp: String,
}

/// Split an error into (reason, message, hint).
fn describe(error: &anyhow::Error) -> (GatewayFailure, String, String) {
    match error.downcast_ref::<ChatError>() {
        Some(ChatError::Gateway {
            reason,
            message,
            hint,
        }) => (*reason, message.clone(), hint.clone()),
        _ => (
            GatewayFailure::Upstream,
            error.to_string(),
            "Check the server logs for more information".to_string(),
        ),
    }
}

/// Stream a chat reply as plain text.
async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    tracing::debug!(
        "Chat request: {} messages, model={:?}, roles={}",
        request.messages.len(),
        request.model,
        request.user_roles.len()
    );

    let events = match state.gateway.stream_chat(request.into()).await {
        Ok(events) => events,
        Err(e) => {
            let (reason, details, hint) = describe(&e);
            tracing::error!("Chat request failed ({}): {}", reason, details);
            let body = ChatErrorBody {
                error: "Failed to process the chat request".to_string(),
                details,
                hint,
                reason,
                timestamp: Utc::now().to_rfc3339(),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }
    };

    let body = events.filter_map(|event| async move {
        match event {
            Ok(GatewayEvent::TextDelta(text)) => Some(Ok(Bytes::from(text))),
            Ok(GatewayEvent::Finish { usage, .. }) => {
                if let Some(usage) = usage {
                    tracing::debug!("Reply finished: {} tokens", usage.total_tokens);
                }
                None
            }
            Err(e) => {
                tracing::error!("Reply stream failed: {}", e);
                Some(Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                )))
            }
        }
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

/// Verify credentials and reachability of the upstream.
async fn check_connection(State(state): State<Arc<AppState>>) -> Response {
    let timestamp = Utc::now().to_rfc3339();

    match state.gateway.check_connection().await {
        Ok(info) => {
            tracing::info!("Connection check succeeded with model {}", info.model);
            Json(CheckConnectionBody {
                success: true,
                message: Some("Connection to the language model established".to_string()),
                model_info: Some(info),
                error: None,
                hint: None,
                reason: None,
                timestamp,
            })
            .into_response()
        }
        Err(e) => {
            let (reason, details, hint) = describe(&e);
            tracing::error!("Connection check failed ({}): {}", reason, details);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CheckConnectionBody {
                    success: false,
                    message: None,
                    model_info: None,
                    error: Some(details),
                    hint: Some(hint),
                    reason: Some(reason),
                    timestamp,
                }),
            )
                .into_response()
        }
    }
}
