//! Tool Registry (§4.8, §5, §9). Composes built-in tools with MCP-discovered
//! ones into an immutable snapshot swapped lock-free behind an `ArcSwap`, so
//! the invoke-tools node reads a single consistent view for the whole node
//! even if an admin disables a tool mid-flight (§9 resolved Open Question).

use super::tool::Tool;
use crate::domain::tool::{ToolCategory, ToolOrigin, ToolRecord};
use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// An immutable, point-in-time view of the registry: every record plus the
/// callable handler for every record currently enabled. Disabled tools keep
/// their record (so the admin surface can re-enable them) but drop out of
/// `callable`.
#[derive(Clone)]
pub struct ToolSnapshot {
    records: HashMap<String, ToolRecord>,
    callables: HashMap<String, Tool>,
}

impl ToolSnapshot {
    fn empty() -> Self {
        ToolSnapshot { records: HashMap::new(), callables: HashMap::new() }
    }

    /// Tools available to hand the LLM (OpenAI tool-call schema), enabled only.
    pub fn openai_tool_specs(&self) -> Vec<Value> {
        self.records
            .values()
            .filter(|r| r.enabled)
            .filter_map(|r| self.callables.get(&r.name))
            .map(|tool| tool.to_openai_format())
            .collect()
    }

    pub fn record(&self, name: &str) -> Option<&ToolRecord> {
        self.records.get(name)
    }

    pub fn list(&self) -> Vec<ToolRecord> {
        let mut records: Vec<ToolRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Invoke a tool captured in this snapshot. Returns `Error::tool` if the
    /// tool is unknown or was disabled at snapshot time.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value> {
        let record = self.records.get(name).ok_or_else(|| Error::tool(format!("unknown tool: {name}")))?;
        if !record.enabled {
            return Err(Error::tool(format!("tool disabled: {name}")));
        }
        let tool = self.callables.get(name).ok_or_else(|| Error::tool(format!("no handler for tool: {name}")))?;
        tool.execute(arguments).await
    }
}

/// Registry of callable tools (§4.8). Built-in tools are registered once at
/// startup; MCP servers contribute tools discovered over HTTP, namespaced
/// `{server_name}.{tool_name}` to avoid collisions. Enable/disable and MCP
/// discovery all publish a fresh snapshot; readers never block on a writer.
pub struct ToolRegistry {
    snapshot: ArcSwap<ToolSnapshot>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { snapshot: ArcSwap::from_pointee(ToolSnapshot::empty()) }
    }

    pub fn snapshot(&self) -> Arc<ToolSnapshot> {
        self.snapshot.load_full()
    }

    /// Register a built-in, process-local tool.
    pub fn register_local(&self, tool: Tool, category: ToolCategory) {
        let record = ToolRecord::new_local(tool.name(), tool.description(), tool.input_schema().clone(), category);
        self.insert(record, tool);
    }

    /// Register a tool discovered from an MCP server, namespaced to avoid
    /// colliding with another server's tool of the same short name.
    pub fn register_mcp(&self, server_id: Uuid, server_name: &str, tool: Tool) {
        let namespaced_name = format!("{server_name}.{}", tool.name());
        let record = ToolRecord::new_mcp(&namespaced_name, tool.description(), tool.input_schema().clone(), server_id, server_name);
        self.insert(record, tool);
    }

    fn insert(&self, record: ToolRecord, tool: Tool) {
        self.update(|records, callables| {
            callables.insert(record.name.clone(), tool);
            records.insert(record.name.clone(), record);
        });
    }

    /// Remove every tool contributed by one MCP server (disconnect/removal).
    pub fn remove_server(&self, server_id: Uuid) {
        self.update(|records, callables| {
            let doomed: Vec<String> = records
                .values()
                .filter(|r| matches!(&r.origin, ToolOrigin::Mcp { server_id: sid, .. } if *sid == server_id))
                .map(|r| r.name.clone())
                .collect();
            for name in doomed {
                records.remove(&name);
                callables.remove(&name);
            }
        });
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut found = false;
        self.update(|records, _| {
            if let Some(record) = records.get_mut(name) {
                record.enabled = enabled;
                record.updated_at = chrono::Utc::now();
                found = true;
            }
        });
        if found {
            Ok(())
        } else {
            Err(Error::not_found(format!("tool not found: {name}")))
        }
    }

    fn update(&self, mutate: impl FnOnce(&mut HashMap<String, ToolRecord>, &mut HashMap<String, Tool>)) {
        let current = self.snapshot.load_full();
        let mut records = current.records.clone();
        let mut callables = current.callables.clone();
        mutate(&mut records, &mut callables);
        self.snapshot.store(Arc::new(ToolSnapshot { records, callables }));
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_tool(name: &str) -> Tool {
        Tool::new(name, "a test tool", json!({}), |_args| async move { Ok(json!({"ok": true})) })
    }

    #[tokio::test]
    async fn disabled_tool_is_excluded_from_specs_and_rejects_invoke() {
        let registry = ToolRegistry::new();
        registry.register_local(noop_tool("lookup_balance"), ToolCategory::Lookup);
        registry.set_enabled("lookup_balance", false).unwrap();

        let snapshot = registry.snapshot();
        assert!(snapshot.openai_tool_specs().is_empty());
        let err = snapshot.invoke("lookup_balance", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[tokio::test]
    async fn mid_flight_snapshot_survives_concurrent_disable() {
        let registry = ToolRegistry::new();
        registry.register_local(noop_tool("calc_fee"), ToolCategory::Calculation);

        let snapshot = registry.snapshot();
        registry.set_enabled("calc_fee", false).unwrap();

        // the snapshot captured before the disable still sees it enabled
        let result = snapshot.invoke("calc_fee", json!({})).await.unwrap();
        assert_eq!(result["ok"], true);

        let fresh = registry.snapshot();
        assert!(fresh.invoke("calc_fee", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn mcp_tools_are_namespaced_and_removable_by_server() {
        let registry = ToolRegistry::new();
        let server_id = Uuid::new_v4();
        registry.register_mcp(server_id, "ledger", noop_tool("get_transaction"));

        let snapshot = registry.snapshot();
        assert!(snapshot.record("ledger.get_transaction").is_some());

        registry.remove_server(server_id);
        let after = registry.snapshot();
        assert!(after.record("ledger.get_transaction").is_none());
    }

    #[test]
    fn set_enabled_on_unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.set_enabled("nope", false).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
