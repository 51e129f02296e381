//! Chat & session endpoints (§4.9, §4.10, §4.11, §6).

use crate::agent::graph::{run_graph, StreamChunk};
use crate::agent::{ConfidenceBreakdown, SourceView};
use crate::domain::{ConfidenceMethod, Message, MessageRole};
use crate::error::{Error, Result};
use crate::http::auth::AuthUser;
use crate::http::AppState;
use crate::notifier::Alert;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponseDto {
    pub message: String,
    pub confidence: f64,
    pub confidence_method: ConfidenceMethod,
    pub confidence_breakdown: Option<ConfidenceBreakdown>,
    pub sources: Vec<SourceView>,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub session_id: String,
    pub response_time_ms: u64,
    pub tokens_used: u64,
}

fn session_id_or_new(requested: Option<String>) -> String {
    requested.filter(|s| !s.is_empty()).unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn record_turn(state: &AppState, user_id: Uuid, session_id: &str, user_message: &str, response: &crate::agent::AgentResponse) -> Result<()> {
    state
        .deps
        .session_store
        .append_message(user_id, session_id, Message::new(session_id, MessageRole::User, user_message))
        .await?;
    let mut assistant = Message::new(session_id, MessageRole::Assistant, response.message.clone());
    assistant.confidence = Some(response.confidence);
    assistant.escalated = response.escalated;
    state.deps.session_store.append_message(user_id, session_id, assistant).await?;
    Ok(())
}

pub async fn chat(State(state): State<AppState>, auth: AuthUser, Json(req): Json<ChatRequest>) -> Result<Json<ChatResponseDto>> {
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(Error::validation(format!("message exceeds {MAX_MESSAGE_CHARS} characters")));
    }
    let session_id = session_id_or_new(req.session_id);

    let response = run_graph(&state.deps, req.message.clone(), session_id.clone(), auth.user_id, None).await;

    if let Err(err) = record_turn(&state, auth.user_id, &session_id, &req.message, &response).await {
        state.notifier.notify(
            Alert::new(&state.settings.environment, "session_write_failed", err.to_string())
                .with_request("POST", "/api/v1/chat")
                .with_user(auth.user_id.to_string())
                .with_session(session_id.clone()),
        );
    }

    Ok(Json(ChatResponseDto {
        message: response.message,
        confidence: response.confidence,
        confidence_method: response.confidence_method,
        confidence_breakdown: response.confidence_breakdown,
        sources: response.sources,
        escalated: response.escalated,
        escalation_reason: response.escalation_reason,
        session_id: response.session_id,
        response_time_ms: response.response_time_ms,
        tokens_used: response.tokens_used,
    }))
}

/// NDJSON line for one `StreamChunk` (§4.11): one `serde_json` object per
/// line, newline-terminated, never buffered past a single chunk boundary.
fn encode_chunk(chunk: &StreamChunk) -> axum::body::Bytes {
    let mut line = serde_json::to_vec(chunk).unwrap_or_default();
    line.push(b'\n');
    axum::body::Bytes::from(line)
}

pub async fn chat_stream(State(state): State<AppState>, auth: AuthUser, Json(req): Json<ChatRequest>) -> Result<Response> {
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(Error::validation(format!("message exceeds {MAX_MESSAGE_CHARS} characters")));
    }
    let session_id = session_id_or_new(req.session_id);
    let (tx, rx) = tokio::sync::mpsc::channel::<StreamChunk>(32);

    let deps = state.deps.clone();
    let user_message = req.message.clone();
    let session_for_task = session_id.clone();
    let state_for_task = state.clone();
    let user_id = auth.user_id;
    tokio::spawn(async move {
        let response = run_graph(&deps, user_message.clone(), session_for_task.clone(), user_id, Some(tx)).await;
        if let Err(err) = record_turn(&state_for_task, user_id, &session_for_task, &user_message, &response).await {
            state_for_task.notifier.notify(
                Alert::new(&state_for_task.settings.environment, "session_write_failed", err.to_string())
                    .with_request("POST", "/api/v1/chat/stream")
                    .with_user(user_id.to_string())
                    .with_session(session_for_task.clone()),
            );
        }
    });

    let body_stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Error>(encode_chunk(&chunk)), rx))
    });

    Ok(Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .map_err(|e| Error::internal(format!("failed to build streaming response: {e}")))?
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub items: Vec<crate::domain::Session>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

pub async fn list_sessions(State(state): State<AppState>, auth: AuthUser, Query(q): Query<PageQuery>) -> Result<Json<SessionsResponse>> {
    let page = crate::store::SessionPage { page: q.page.unwrap_or(1), page_size: q.page_size.unwrap_or(20).min(100) };
    let listing = state.deps.session_store.list_sessions(auth.user_id, page).await?;
    Ok(Json(SessionsResponse {
        items: listing.items,
        total: listing.total,
        page: listing.page,
        page_size: listing.page_size,
        total_pages: listing.total_pages,
    }))
}

pub async fn history(State(state): State<AppState>, auth: AuthUser, Path(session_id): Path<String>) -> Result<Json<Vec<Message>>> {
    let messages = state.deps.session_store.history(auth.user_id, &session_id).await?;
    Ok(Json(messages))
}

pub async fn delete_session(State(state): State<AppState>, auth: AuthUser, Path(session_id): Path<String>) -> Result<axum::http::StatusCode> {
    state.deps.session_store.delete_session(auth.user_id, &session_id).await?;
    Ok(axum::http::StatusCode::OK)
}
