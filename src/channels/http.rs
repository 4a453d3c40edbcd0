//! JSON HTTP API over the assistant.
//!
//! The assistant sits behind a `tokio::sync::Mutex`; each handler holds the
//! lock for the whole request, so a chat turn (including the completion
//! call) finishes before the next request touches the transcript.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::conversation::{Assistant, ConnectReport, Mode};

/// Shared state for the HTTP routes.
#[derive(Clone)]
pub struct HttpState {
    pub assistant: Arc<Mutex<Assistant>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Missing and blank messages both get the 400 below.
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub model: String,
    /// Always true: completions run on the user's machine.
    pub local: bool,
    pub used_knowledge: bool,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<ConnectReport>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KnowledgeRequest {
    #[serde(default)]
    pub path: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /api/chat
async fn chat(State(state): State<HttpState>, Json(req): Json<ChatRequest>) -> impl IntoResponse {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Message is required"})),
        )
            .into_response();
    }

    let mut assistant = state.assistant.lock().await;
    let reply = assistant.submit(&req.message).await;
    Json(ChatResponse {
        response: reply.response.unwrap_or_default(),
        model: assistant.model_name().to_string(),
        local: true,
        used_knowledge: reply.used_knowledge,
        mode: reply.mode,
        connected: reply.connected,
    })
    .into_response()
}

/// GET /api/transcript
async fn transcript(State(state): State<HttpState>) -> impl IntoResponse {
    let assistant = state.assistant.lock().await;
    Json(assistant.transcript().clone())
}

/// GET /api/onboarding/status
async fn onboarding_status(State(state): State<HttpState>) -> impl IntoResponse {
    let assistant = state.assistant.lock().await;
    Json(assistant.status())
}

/// POST /api/reset
///
/// Clears everything, then re-opens the conversation with the first prompt.
async fn reset(State(state): State<HttpState>) -> impl IntoResponse {
    let mut assistant = state.assistant.lock().await;
    assistant.reset().await;
    let greeting = assistant.start().await.map(|m| m.content.clone());
    Json(serde_json::json!({"status": "reset", "greeting": greeting}))
}

/// POST /api/knowledge
async fn connect_knowledge(
    State(state): State<HttpState>,
    body: Bytes,
) -> impl IntoResponse {
    // An empty body means "no path", which the picker treats as cancelled.
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        KnowledgeRequest::default()
    } else {
        match serde_json::from_slice::<KnowledgeRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": e.to_string()})),
                )
                    .into_response();
            }
        }
    };
    let mut assistant = state.assistant.lock().await;
    let report = assistant.connect_folder(req.path.as_deref()).await;
    let status = match report {
        ConnectReport::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    (status, Json(report)).into_response()
}

/// Build the API router.
pub fn api_routes(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/transcript", get(transcript))
        .route("/api/onboarding/status", get(onboarding_status))
        .route("/api/reset", post(reset))
        .route("/api/knowledge", post(connect_knowledge))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the API until the task is dropped.
pub async fn serve(state: HttpState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP API started");
    axum::serve(listener, api_routes(state)).await
}
