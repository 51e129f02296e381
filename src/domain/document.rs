//! Document and Chunk (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Slack,
    Whatsapp,
    Telegram,
    AdminUpload,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Slack => "slack",
            Source::Whatsapp => "whatsapp",
            Source::Telegram => "telegram",
            Source::AdminUpload => "admin_upload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A single retrievable item (§3). `(source, source_id)` is unique; a second
/// ingestion of the same `source_id` upserts in place (§4.6, scenario 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub source: Source,
    pub source_id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub processing_status: ProcessingStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new_pending(title: impl Into<String>, source: Source, source_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            title: title.into(),
            source,
            source_id: source_id.into(),
            content: String::new(),
            metadata: serde_json::json!({}),
            processing_status: ProcessingStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A searchable fragment of a Document (§3). Immutable once written: updates
/// are expressed as a whole-document replacement (`UpsertDocument`, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Fixed embedding dimensionality shared by the whole corpus (§3).
pub const EMBEDDING_DIM: usize = 1536;
