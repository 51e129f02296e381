//! Append-only audit log for Admin Control Plane mutations (§4.13). Never
//! mutated after insert; readable only by the admin surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_user_id: Uuid,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        AuditLog { entries: RwLock::new(Vec::new()) }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn record(
        &self,
        actor_user_id: Uuid,
        action: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            actor_user_id,
            action: action.into(),
            target_type: target_type.into(),
            target_id: target_id.into(),
            before,
            after,
            at: Utc::now(),
        };
        self.entries.write().await.push(entry);
    }

    pub async fn all(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_appended_in_order() {
        let log = AuditLog::new();
        let actor = Uuid::new_v4();
        log.record(actor, "enable", "tool", "calculator", None, None).await;
        log.record(actor, "disable", "tool", "calculator", None, None).await;
        let entries = log.all().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "enable");
        assert_eq!(entries[1].action, "disable");
    }
}
