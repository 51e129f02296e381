//! Document CRUD and admin upload (§4.6, §6). Uploads are synchronous:
//! the handler awaits the full extract/anonymize/chunk/embed/upsert
//! pipeline via `IngestionCoordinator::process_now` before responding, per
//! §4.6's "single admin upload: synchronous ingestion."

use crate::domain::{Document, ProcessingStatus, Source};
use crate::error::{Error, Result};
use crate::http::auth::AuthUser;
use crate::http::AppState;
use crate::ingestion::RawItem;
use axum::extract::multipart::Multipart;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_BULK_FILES: usize = 10;

fn parse_source(s: &str) -> Result<Source> {
    match s {
        "slack" => Ok(Source::Slack),
        "whatsapp" => Ok(Source::Whatsapp),
        "telegram" => Ok(Source::Telegram),
        "admin_upload" => Ok(Source::AdminUpload),
        other => Err(Error::validation(format!("unknown source: {other}"))),
    }
}

async fn ingest_one_file(state: &AppState, title: String, content: String) -> Result<Document> {
    if content.trim().is_empty() {
        return Err(Error::validation("uploaded file has no extractable text content"));
    }
    state
        .ingestion
        .process_now(RawItem {
            title,
            source: Source::AdminUpload,
            source_id: Uuid::new_v4().to_string(),
            content,
            metadata: serde_json::json!({}),
        })
        .await
}

pub async fn upload(State(state): State<AppState>, _auth: AuthUser, mut multipart: Multipart) -> Result<Json<Document>> {
    let mut title = None;
    let mut content = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::validation(format!("malformed multipart body: {e}")))? {
        match field.name().unwrap_or_default() {
            "title" => title = Some(field.text().await.map_err(|e| Error::validation(e.to_string()))?),
            "file" => {
                let file_name = field.file_name().map(|n| n.to_string());
                let bytes = field.bytes().await.map_err(|e| Error::validation(e.to_string()))?;
                title = title.or(file_name);
                content = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            _ => {}
        }
    }
    let content = content.ok_or_else(|| Error::validation("multipart body missing a 'file' field"))?;
    let title = title.unwrap_or_else(|| "untitled upload".to_string());
    Ok(Json(ingest_one_file(&state, title, content).await?))
}

pub async fn upload_bulk(State(state): State<AppState>, _auth: AuthUser, mut multipart: Multipart) -> Result<Json<Vec<Document>>> {
    let mut files: Vec<(String, String)> = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::validation(format!("malformed multipart body: {e}")))? {
        if field.name() == Some("files") {
            let file_name = field.file_name().map(|n| n.to_string()).unwrap_or_else(|| "untitled upload".to_string());
            let bytes = field.bytes().await.map_err(|e| Error::validation(e.to_string()))?;
            files.push((file_name, String::from_utf8_lossy(&bytes).into_owned()));
        }
    }
    if files.is_empty() {
        return Err(Error::validation("bulk upload requires at least one 'files' field"));
    }
    if files.len() > MAX_BULK_FILES {
        return Err(Error::validation(format!("bulk upload accepts at most {MAX_BULK_FILES} files")));
    }

    let mut documents = Vec::with_capacity(files.len());
    for (title, content) in files {
        documents.push(ingest_one_file(&state, title, content).await?);
    }
    Ok(Json(documents))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub source: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DocumentsPage {
    pub items: Vec<Document>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

fn parse_status(s: &str) -> Result<ProcessingStatus> {
    match s {
        "pending" => Ok(ProcessingStatus::Pending),
        "processing" => Ok(ProcessingStatus::Processing),
        "completed" => Ok(ProcessingStatus::Completed),
        "failed" => Ok(ProcessingStatus::Failed),
        other => Err(Error::validation(format!("unknown status: {other}"))),
    }
}

pub async fn list(State(state): State<AppState>, _auth: AuthUser, Query(q): Query<ListQuery>) -> Result<Json<DocumentsPage>> {
    let filters = crate::store::DocumentFilters {
        source: q.source.as_deref().map(parse_source).transpose()?,
        status: q.status.as_deref().map(parse_status).transpose()?,
    };
    let page = crate::store::Page { page: q.page.unwrap_or(1), page_size: q.page_size.unwrap_or(20).min(100) };
    let result = state.deps.vector_store.list_documents(filters, page).await?;
    Ok(Json(DocumentsPage { items: result.items, total: result.total, page: result.page, page_size: result.page_size }))
}

pub async fn get_one(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Document>> {
    Ok(Json(state.deps.vector_store.get_document(id).await?))
}

pub async fn delete_one(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.deps.vector_store.delete_document(id).await?;
    Ok(StatusCode::OK)
}
