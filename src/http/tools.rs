//! Tool management endpoints (§4.8, §6). `PATCH /tools/{name}` is scoped to
//! the one mutable field the registry actually exposes past registration
//! time — `enabled` — since `ToolRegistry` has no generic record-mutation
//! method; richer config (schema, category) is set at registration, not
//! over HTTP.

use crate::domain::ToolRecord;
use crate::error::{Error, Result};
use crate::http::auth::AuthUser;
use crate::http::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

pub async fn list(State(state): State<AppState>, _auth: AuthUser) -> Json<Vec<ToolRecord>> {
    Json(state.deps.tool_registry.snapshot().list())
}

pub async fn get_one(State(state): State<AppState>, _auth: AuthUser, Path(name): Path<String>) -> Result<Json<ToolRecord>> {
    state
        .deps
        .tool_registry
        .snapshot()
        .record(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("tool not found: {name}")))
}

#[derive(Debug, Deserialize)]
pub struct ToolPatch {
    pub enabled: Option<bool>,
}

pub async fn patch_one(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
    Json(patch): Json<ToolPatch>,
) -> Result<Json<ToolRecord>> {
    if let Some(enabled) = patch.enabled {
        state.deps.tool_registry.set_enabled(&name, enabled)?;
    }
    state
        .deps
        .tool_registry
        .snapshot()
        .record(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("tool not found: {name}")))
}

pub async fn enable(State(state): State<AppState>, _auth: AuthUser, Path(name): Path<String>) -> Result<StatusCode> {
    state.deps.tool_registry.set_enabled(&name, true)?;
    Ok(StatusCode::OK)
}

pub async fn disable(State(state): State<AppState>, _auth: AuthUser, Path(name): Path<String>) -> Result<StatusCode> {
    state.deps.tool_registry.set_enabled(&name, false)?;
    Ok(StatusCode::OK)
}
