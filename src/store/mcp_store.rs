//! MCP server registry (§4.13, §6). Keeps admin-facing `McpServer` rows
//! separate from the Tool Registry: this store owns the record (url,
//! enabled flag, health, discovered tool names), while `ToolRegistry` owns
//! the callable handlers those records describe.

use crate::domain::McpServer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait McpServerStore: Send + Sync {
    async fn create(&self, server: McpServer) -> Result<McpServer>;
    async fn get(&self, id: Uuid) -> Result<McpServer>;
    async fn list(&self) -> Result<Vec<McpServer>>;
    async fn update(&self, server: McpServer) -> Result<McpServer>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// `DashMap`-backed registry, one row per MCP server (§4.1a's pattern
/// applied to a third independently-keyed collection).
pub struct InMemoryMcpServerStore {
    servers: DashMap<Uuid, McpServer>,
}

impl InMemoryMcpServerStore {
    pub fn new() -> Self {
        InMemoryMcpServerStore { servers: DashMap::new() }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryMcpServerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpServerStore for InMemoryMcpServerStore {
    async fn create(&self, server: McpServer) -> Result<McpServer> {
        if self.servers.iter().any(|entry| entry.name == server.name) {
            return Err(Error::conflict(format!("mcp server already registered: {}", server.name)));
        }
        self.servers.insert(server.id, server.clone());
        Ok(server)
    }

    async fn get(&self, id: Uuid) -> Result<McpServer> {
        self.servers.get(&id).map(|e| e.clone()).ok_or_else(|| Error::not_found("mcp server not found"))
    }

    async fn list(&self) -> Result<Vec<McpServer>> {
        let mut servers: Vec<McpServer> = self.servers.iter().map(|e| e.clone()).collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(servers)
    }

    async fn update(&self, server: McpServer) -> Result<McpServer> {
        if !self.servers.contains_key(&server.id) {
            return Err(Error::not_found("mcp server not found"));
        }
        self.servers.insert(server.id, server.clone());
        Ok(server)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.servers.remove(&id).map(|_| ()).ok_or_else(|| Error::not_found("mcp server not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let store = InMemoryMcpServerStore::new();
        store.create(McpServer::new("ledger", "https://ledger.internal").unwrap()).await.unwrap();
        let err = store.create(McpServer::new("ledger", "https://ledger2.internal").unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = InMemoryMcpServerStore::new();
        let server = store.create(McpServer::new("ledger", "https://ledger.internal").unwrap()).await.unwrap();
        store.delete(server.id).await.unwrap();
        assert!(matches!(store.get(server.id).await.unwrap_err(), Error::NotFound(_)));
    }
}
