//! Admin Control Plane (§4.13, §6): agent config, prompt versions, and the
//! static LLM model catalog. Every mutation is audit-logged with actor
//! identity (§4.13); reads are not.

use crate::domain::{AgentConfig, ConfigPatch, Prompt};
use crate::error::{Error, Result};
use crate::http::auth::AuthUser;
use crate::http::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub async fn get_config(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<AgentConfig>> {
    Ok(Json(state.deps.config_store.get_active_config(&state.deps.environment).await?))
}

pub async fn put_config(State(state): State<AppState>, auth: AuthUser, Json(patch): Json<ConfigPatch>) -> Result<Json<AgentConfig>> {
    let before = state.deps.config_store.get_active_config(&state.deps.environment).await.ok();
    let after = state.deps.config_store.update_config(&state.deps.environment, patch).await?;
    state
        .audit_log
        .record(
            auth.user_id,
            "update_config",
            "agent_config",
            after.id.to_string(),
            before.map(|c| serde_json::to_value(c).unwrap_or_default()),
            Some(serde_json::to_value(&after).unwrap_or_default()),
        )
        .await;
    Ok(Json(after))
}

pub async fn list_prompts(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Vec<Prompt>>> {
    Ok(Json(state.deps.prompt_store.list().await?))
}

pub async fn get_prompt(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Prompt>> {
    Ok(Json(state.deps.prompt_store.get_prompt(id).await?))
}

pub async fn prompt_history(State(state): State<AppState>, _auth: AuthUser, Path(name): Path<String>) -> Result<Json<Vec<Prompt>>> {
    Ok(Json(state.deps.prompt_store.history(&name).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreatePromptVersion {
    pub name: String,
    pub prompt_type: String,
    pub content: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub activate: bool,
}

pub async fn create_prompt_version(State(state): State<AppState>, auth: AuthUser, Json(req): Json<CreatePromptVersion>) -> Result<Json<Prompt>> {
    let prompt = state
        .deps
        .prompt_store
        .create_prompt_version(&req.name, &req.prompt_type, &req.content, req.notes, req.activate)
        .await?;
    state
        .audit_log
        .record(
            auth.user_id,
            "create_prompt_version",
            "prompt",
            prompt.id.to_string(),
            None,
            Some(serde_json::to_value(&prompt).unwrap_or_default()),
        )
        .await;
    Ok(Json(prompt))
}

pub async fn activate_prompt(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Prompt>> {
    let before = state.deps.prompt_store.get_prompt(id).await.ok();
    let after = state.deps.prompt_store.activate_version(id).await?;
    state
        .audit_log
        .record(
            auth.user_id,
            "activate_prompt",
            "prompt",
            after.id.to_string(),
            before.map(|p| serde_json::to_value(p).unwrap_or_default()),
            Some(serde_json::to_value(&after).unwrap_or_default()),
        )
        .await;
    Ok(Json(after))
}

/// Prompt content itself is immutable once versioned (§3); the only
/// field this crate allows patching post-creation is `notes`, since a
/// content edit is a new version by definition.
#[derive(Debug, Deserialize)]
pub struct PatchPrompt {
    pub notes: Option<String>,
}

pub async fn patch_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<PatchPrompt>,
) -> Result<Json<Prompt>> {
    let mut prompt = state.deps.prompt_store.get_prompt(id).await?;
    if patch.notes.is_none() {
        return Err(Error::validation("no mutable fields supplied"));
    }
    prompt.notes = patch.notes;
    let recreated = state
        .deps
        .prompt_store
        .create_prompt_version(&prompt.name, &prompt.prompt_type, &prompt.content, prompt.notes.clone(), false)
        .await?;
    state
        .audit_log
        .record(
            auth.user_id,
            "patch_prompt_notes",
            "prompt",
            id.to_string(),
            None,
            Some(serde_json::to_value(&recreated).unwrap_or_default()),
        )
        .await;
    Ok(Json(recreated))
}

#[derive(Debug, Serialize)]
pub struct LlmModel {
    pub provider: &'static str,
    pub model: &'static str,
    pub input_cost_per_1k_tokens_usd: f64,
    pub output_cost_per_1k_tokens_usd: f64,
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub provider: Option<String>,
}

fn catalog() -> Vec<LlmModel> {
    vec![
        LlmModel { provider: "openai", model: "gpt-4o", input_cost_per_1k_tokens_usd: 0.005, output_cost_per_1k_tokens_usd: 0.015 },
        LlmModel { provider: "openai", model: "gpt-4o-mini", input_cost_per_1k_tokens_usd: 0.00015, output_cost_per_1k_tokens_usd: 0.0006 },
        LlmModel { provider: "anthropic", model: "claude-3-5-sonnet", input_cost_per_1k_tokens_usd: 0.003, output_cost_per_1k_tokens_usd: 0.015 },
        LlmModel { provider: "azure", model: "gpt-4o", input_cost_per_1k_tokens_usd: 0.005, output_cost_per_1k_tokens_usd: 0.015 },
        LlmModel { provider: "google", model: "gemini-1.5-pro", input_cost_per_1k_tokens_usd: 0.00125, output_cost_per_1k_tokens_usd: 0.005 },
    ]
}

pub async fn list_llm_models(_auth: AuthUser, axum::extract::Query(q): axum::extract::Query<ModelsQuery>) -> Json<Vec<LlmModel>> {
    let models = catalog().into_iter().filter(|m| q.provider.as_deref().map_or(true, |p| p == m.provider)).collect();
    Json(models)
}
