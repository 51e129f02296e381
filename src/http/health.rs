//! `GET /health` (§6): a liveness probe with no auth and no dependency
//! fan-out — it reports the process is up, not that every collaborator is.

use axum::response::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
