//! Tool registry record (§3, §4.8). Wraps a callable tool (local or
//! MCP-discovered) with the metadata the registry and admin surface need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Lookup,
    Calculation,
    Notification,
    Escalation,
    Other,
}

/// Where a tool's implementation lives: built into the process, or
/// discovered from a remote MCP server (namespaced `{server}.{tool}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ToolOrigin {
    Local,
    Mcp { server_id: Uuid, server_name: String },
}

/// Registry entry for one tool (§4.8). The callable handler itself is not
/// part of this record; it lives in the in-memory registry keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub category: ToolCategory,
    pub origin: ToolOrigin,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolRecord {
    pub fn new_local(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        category: ToolCategory,
    ) -> Self {
        let now = Utc::now();
        ToolRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            input_schema,
            category,
            origin: ToolOrigin::Local,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_mcp(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        server_id: Uuid,
        server_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        ToolRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            input_schema,
            category: ToolCategory::Other,
            origin: ToolOrigin::Mcp { server_id, server_name: server_name.into() },
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}
