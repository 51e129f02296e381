//! Prompt (§3) — an immutable, versioned template keyed by
//! `(name, prompt_type, version)` with at most one active sibling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub name: String,
    pub prompt_type: String,
    pub version: u32,
    pub content: String,
    pub active: bool,
    pub tags: Vec<String>,
    pub usage_count: u64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prompt {
    pub fn new_version(
        name: impl Into<String>,
        prompt_type: impl Into<String>,
        version: u32,
        content: impl Into<String>,
        notes: Option<String>,
        active: bool,
    ) -> Self {
        let now = Utc::now();
        Prompt {
            id: Uuid::new_v4(),
            name: name.into(),
            prompt_type: prompt_type.into(),
            version,
            content: content.into(),
            active,
            tags: Vec::new(),
            usage_count: 0,
            notes,
            created_at: now,
            updated_at: now,
        }
    }
}
