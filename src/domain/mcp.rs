//! MCP / remote-tool-server record (§3). Enabling a server merges its
//! discovered tools (namespaced `{server}.{tool}`) into the Tool Registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unreachable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub health: HealthStatus,
    pub discovered_tools: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> crate::error::Result<Self> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(crate::error::Error::validation("mcp server url must be http or https"));
        }
        let now = Utc::now();
        Ok(McpServer {
            id: Uuid::new_v4(),
            name: name.into(),
            url,
            enabled: false,
            health: HealthStatus::Unknown,
            discovered_tools: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }
}
