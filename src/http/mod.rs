//! HTTP surface (§6): one axum `Router` binding every external endpoint to
//! the agent core. Generalizes the teacher SDK's HTTP posture (a client
//! calling out to a provider) into a service's inbound posture — routing,
//! auth extraction, and error mapping live here; every handler stays thin
//! and delegates to `agent::graph`, the stores, or the ingestion coordinator.

pub mod admin;
pub mod auth;
pub mod chat;
pub mod documents;
pub mod error_response;
pub mod health;
pub mod mcp;
pub mod sources;
pub mod tools;
pub mod webhooks;

use crate::agent::AgentDeps;
use crate::http::auth::TokenVerifier;
use crate::ingestion::{IngestionCoordinator, SlackCollector, WhatsappCollector};
use crate::notifier::Notifier;
use crate::settings::Settings;
use crate::store::{AuditLog, McpServerStore};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<AgentDeps>,
    pub mcp_store: Arc<dyn McpServerStore>,
    pub ingestion: Arc<IngestionCoordinator>,
    pub notifier: Notifier,
    pub settings: Arc<Settings>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub audit_log: Arc<AuditLog>,
    pub slack_collector: Option<Arc<SlackCollector>>,
    pub whatsapp_collector: Option<Arc<WhatsappCollector>>,
    pub telegram_signing_secret: Option<Arc<str>>,
}

/// Assemble the full `/api/v1` router (§6). Kept as one function so
/// `main.rs` never has to know the per-resource module layout.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/chat", post(chat::chat))
        .route("/chat/stream", post(chat::chat_stream))
        .route("/chat/sessions", get(chat::list_sessions))
        .route("/chat/history/:session_id", get(chat::history))
        .route("/chat/session/:session_id", delete(chat::delete_session))
        .route("/documents/upload", post(documents::upload))
        .route("/documents/upload/bulk", post(documents::upload_bulk))
        .route("/documents", get(documents::list))
        .route("/documents/:id", get(documents::get_one))
        .route("/documents/:id", delete(documents::delete_one))
        .route("/tools", get(tools::list))
        .route("/tools/:name", get(tools::get_one))
        .route("/tools/:name", patch(tools::patch_one))
        .route("/tools/:name/enable", post(tools::enable))
        .route("/tools/:name/disable", post(tools::disable))
        .route("/mcp-servers", get(mcp::list).post(mcp::create))
        .route("/mcp-servers/:id", patch(mcp::patch_one).delete(mcp::delete_one))
        .route("/mcp-servers/:id/enable", post(mcp::enable))
        .route("/mcp-servers/:id/disable", post(mcp::disable))
        .route("/mcp-servers/:id/refresh-tools", post(mcp::refresh_tools))
        .route("/sources/slack/ingest", post(sources::ingest_slack))
        .route("/sources/status", get(sources::status))
        .route("/webhooks/slack", post(webhooks::slack))
        .route("/webhooks/whatsapp", post(webhooks::whatsapp))
        .route("/webhooks/telegram", post(webhooks::telegram))
        .route("/agent/config", get(admin::get_config).put(admin::put_config))
        .route("/prompts", get(admin::list_prompts))
        .route("/prompts/versions", post(admin::create_prompt_version))
        .route("/prompts/:id", get(admin::get_prompt).patch(admin::patch_prompt))
        .route("/prompts/:name/history", get(admin::prompt_history))
        .route("/prompts/:id/activate", post(admin::activate_prompt))
        .route("/admin/llm/models", get(admin::list_llm_models));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
