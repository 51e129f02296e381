//! Vector Store Gateway (§4.2). Chunk/document CRUD plus the three search
//! primitives (vector, hybrid, and the keyword score hybrid folds in).
//! Treated as an external collaborator by the spec (§1); this in-process
//! implementation is the trait's only production-shaped occupant until a
//! real pgvector/Qdrant-backed one is wired in behind the same trait.

use crate::domain::{Chunk, Document, ProcessingStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilters {
    pub source: Option<crate::domain::Source>,
    pub status: Option<ProcessingStatus>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Page { page: 1, page_size: 20 }
    }
}

#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert_document(&self, document: Document, chunks: Vec<Chunk>) -> Result<()>;
    async fn delete_document(&self, id: Uuid) -> Result<()>;
    async fn get_document(&self, id: Uuid) -> Result<Document>;
    async fn find_by_source_id(&self, source: crate::domain::Source, source_id: &str) -> Result<Option<Document>>;
    async fn list_documents(&self, filters: DocumentFilters, page: Page) -> Result<Paginated<Document>>;
    async fn vector_search(&self, embedding: &[f32], k: usize, threshold: f64) -> Result<Vec<ScoredChunk>>;
    async fn hybrid_search(&self, embedding: &[f32], query: &str, k: usize, threshold: f64) -> Result<Vec<ScoredChunk>>;
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "of", "to", "in", "on", "for", "and", "or",
    "with", "that", "this", "it", "as", "by", "at", "be", "what", "how", "do", "does",
];

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn keyword_score(query_terms: &HashSet<String>, content: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = tokenize(content);
    let matched = query_terms.iter().filter(|t| content_terms.contains(*t)).count();
    matched as f64 / query_terms.len() as f64
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

struct DocumentEntry {
    document: Document,
    chunks: Vec<Chunk>,
}

/// In-process vector store: `DashMap<Uuid, DocumentEntry>` so independent
/// documents upsert/search without serializing unrelated writers (§4.1a).
pub struct InMemoryVectorStore {
    documents: DashMap<Uuid, DocumentEntry>,
    by_source_id: DashMap<(String, String), Uuid>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        InMemoryVectorStore { documents: DashMap::new(), by_source_id: DashMap::new() }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn all_completed_chunks(&self) -> Vec<Chunk> {
        self.documents
            .iter()
            .filter(|entry| entry.document.processing_status == ProcessingStatus::Completed)
            .flat_map(|entry| entry.chunks.clone())
            .collect()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_document(&self, document: Document, chunks: Vec<Chunk>) -> Result<()> {
        let source_key = (document.source.as_str().to_string(), document.source_id.clone());
        if let Some(existing_id) = self.by_source_id.get(&source_key).map(|v| *v) {
            if existing_id != document.id {
                self.documents.remove(&existing_id);
            }
        }
        self.by_source_id.insert(source_key, document.id);
        self.documents.insert(document.id, DocumentEntry { document, chunks });
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        if let Some((_, entry)) = self.documents.remove(&id) {
            let key = (entry.document.source.as_str().to_string(), entry.document.source_id.clone());
            self.by_source_id.remove(&key);
            Ok(())
        } else {
            Err(Error::not_found("document not found"))
        }
    }

    async fn get_document(&self, id: Uuid) -> Result<Document> {
        self.documents.get(&id).map(|e| e.document.clone()).ok_or_else(|| Error::not_found("document not found"))
    }

    async fn find_by_source_id(&self, source: crate::domain::Source, source_id: &str) -> Result<Option<Document>> {
        let key = (source.as_str().to_string(), source_id.to_string());
        Ok(self.by_source_id.get(&key).and_then(|id| self.documents.get(&*id).map(|e| e.document.clone())))
    }

    async fn list_documents(&self, filters: DocumentFilters, page: Page) -> Result<Paginated<Document>> {
        let mut items: Vec<Document> = self
            .documents
            .iter()
            .map(|e| e.document.clone())
            .filter(|d| filters.source.is_none_or(|s| s == d.source))
            .filter(|d| filters.status.is_none_or(|s| s == d.processing_status))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = items.len();
        let start = ((page.page.max(1) - 1) * page.page_size) as usize;
        let page_items = items.into_iter().skip(start).take(page.page_size as usize).collect();
        Ok(Paginated { items: page_items, total, page: page.page, page_size: page.page_size })
    }

    async fn vector_search(&self, embedding: &[f32], k: usize, threshold: f64) -> Result<Vec<ScoredChunk>> {
        let mut scored: Vec<ScoredChunk> = self
            .all_completed_chunks()
            .into_iter()
            .filter_map(|chunk| {
                let emb = chunk.embedding.as_ref()?;
                let score = cosine_similarity(embedding, emb);
                (score >= threshold).then_some(ScoredChunk { chunk, score })
            })
            .collect();
        sort_and_truncate(&mut scored, k);
        Ok(scored)
    }

    async fn hybrid_search(&self, embedding: &[f32], query: &str, k: usize, threshold: f64) -> Result<Vec<ScoredChunk>> {
        let query_terms = tokenize(query);
        let mut scored: Vec<ScoredChunk> = self
            .all_completed_chunks()
            .into_iter()
            .map(|chunk| {
                let vector = chunk.embedding.as_ref().map(|e| cosine_similarity(embedding, e)).unwrap_or(0.0);
                let keyword = keyword_score(&query_terms, &chunk.content);
                let combined = 0.7 * vector + 0.3 * keyword;
                ScoredChunk { chunk, score: combined }
            })
            .filter(|sc| sc.score >= threshold)
            .collect();

        let mut seen = HashSet::new();
        scored.retain(|sc| seen.insert(sc.chunk.id));
        sort_and_truncate(&mut scored, k);
        Ok(scored)
    }
}

fn sort_and_truncate(scored: &mut Vec<ScoredChunk>, k: usize) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.chunk.created_at.cmp(&a.chunk.created_at))
    });
    scored.truncate(k);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Source;

    fn chunk(document_id: Uuid, content: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id,
            chunk_index: 0,
            content: content.to_string(),
            embedding: Some(embedding),
            token_count: content.len() / 4,
            created_at: chrono::Utc::now(),
        }
    }

    async fn seed_completed(store: &InMemoryVectorStore, content: &str, embedding: Vec<f32>) -> Uuid {
        let mut doc = Document::new_pending("t", Source::AdminUpload, uuid::Uuid::new_v4().to_string());
        doc.processing_status = ProcessingStatus::Completed;
        let id = doc.id;
        let c = chunk(id, content, embedding);
        store.upsert_document(doc, vec![c]).await.unwrap();
        id
    }

    #[tokio::test]
    async fn vector_search_filters_by_threshold_and_sorts_desc() {
        let store = InMemoryVectorStore::new();
        seed_completed(&store, "alpha payment refund", vec![1.0, 0.0]).await;
        seed_completed(&store, "beta unrelated topic", vec![0.0, 1.0]).await;

        let results = store.vector_search(&[1.0, 0.0], 5, 0.5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score >= 0.5);
    }

    #[tokio::test]
    async fn hybrid_search_combines_vector_and_keyword_scores() {
        let store = InMemoryVectorStore::new();
        seed_completed(&store, "refund policy for payments", vec![0.9, 0.1]).await;

        let results = store.hybrid_search(&[0.9, 0.1], "refund policy", 5, 0.1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score > 0.0 && results[0].score <= 1.0);
    }

    #[tokio::test]
    async fn pending_documents_are_excluded_from_search() {
        let store = InMemoryVectorStore::new();
        let doc = Document::new_pending("t", Source::AdminUpload, "x");
        let c = chunk(doc.id, "pending content", vec![1.0, 0.0]);
        store.upsert_document(doc, vec![c]).await.unwrap();

        let results = store.vector_search(&[1.0, 0.0], 5, 0.0).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn upsert_with_same_source_id_replaces_in_place() {
        let store = InMemoryVectorStore::new();
        let mut doc1 = Document::new_pending("t", Source::Slack, "C1_1700000000.1");
        doc1.processing_status = ProcessingStatus::Completed;
        let id1 = doc1.id;
        store.upsert_document(doc1, vec![chunk(id1, "first version", vec![1.0, 0.0])]).await.unwrap();

        let mut doc2 = Document::new_pending("t", Source::Slack, "C1_1700000000.1");
        doc2.processing_status = ProcessingStatus::Completed;
        let id2 = doc2.id;
        store.upsert_document(doc2, vec![chunk(id2, "second version", vec![1.0, 0.0])]).await.unwrap();

        assert!(store.get_document(id1).await.is_err());
        let listing = store.list_documents(DocumentFilters::default(), Page::default()).await.unwrap();
        assert_eq!(listing.total, 1);
    }
}
