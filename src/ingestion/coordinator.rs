//! Ingestion Coordinator (§4.6). Per-source bounded queue, N workers per
//! source draining it, idempotent upsert keyed by `(source, source_id)`,
//! all-or-nothing embed/commit per document.

use crate::chunker::{chunk_text, ChunkerConfig};
use crate::domain::{Chunk, Document, ProcessingStatus, Source};
use crate::llm::EmbeddingClient;
use crate::pii::{anonymize, Gazetteer, PiiStrategy};
use crate::store::VectorStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// One unit of raw ingestion work submitted by a collector (§4.7).
#[derive(Debug, Clone)]
pub struct RawItem {
    pub title: String,
    pub source: Source,
    pub source_id: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Extract-failure and anonymize-failure policy knobs (§4.6 partial failure policy).
#[derive(Debug, Clone, Copy)]
pub struct IngestionConfig {
    pub queue_depth: usize,
    pub workers_per_source: usize,
    pub pii_enabled: bool,
    pub pii_strategy: PiiStrategy,
    pub pii_min_score: f64,
    pub allow_best_effort_on_anonymize_failure: bool,
    pub chunker: ChunkerConfig,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        IngestionConfig {
            queue_depth: 256,
            workers_per_source: 4,
            pii_enabled: true,
            pii_strategy: PiiStrategy::Redact,
            pii_min_score: 0.6,
            allow_best_effort_on_anonymize_failure: true,
            chunker: ChunkerConfig::default(),
        }
    }
}

struct SourceQueue {
    sender: mpsc::Sender<RawItem>,
    workers: Vec<JoinHandle<()>>,
}

/// Coordinates ingestion across all sources. One bounded `mpsc` channel and
/// worker pool is spawned per `Source` the first time it's submitted to.
pub struct IngestionCoordinator {
    config: IngestionConfig,
    pub(crate) vector_store: Arc<dyn VectorStore>,
    embedding_client: Arc<dyn EmbeddingClient>,
    gazetteer: Arc<Gazetteer>,
    queues: tokio::sync::Mutex<HashMap<Source, SourceQueue>>,
    in_flight: Arc<AtomicUsize>,
}

impl IngestionCoordinator {
    pub fn new(
        config: IngestionConfig,
        vector_store: Arc<dyn VectorStore>,
        embedding_client: Arc<dyn EmbeddingClient>,
        gazetteer: Arc<Gazetteer>,
    ) -> Arc<Self> {
        Arc::new(IngestionCoordinator {
            config,
            vector_store,
            embedding_client,
            gazetteer,
            queues: tokio::sync::Mutex::new(HashMap::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Enqueue an item for processing, spawning the source's worker pool on
    /// first use. Returns once the item is accepted onto the queue, not once
    /// it's processed.
    pub async fn submit(self: &Arc<Self>, item: RawItem) -> crate::error::Result<()> {
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(item.source).or_insert_with(|| self.spawn_source_queue(item.source));
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        queue
            .sender
            .send(item)
            .await
            .map_err(|_| crate::error::Error::internal("ingestion queue closed"))
    }

    fn spawn_source_queue(self: &Arc<Self>, source: Source) -> SourceQueue {
        let (tx, rx) = mpsc::channel(self.config.queue_depth);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let mut workers = Vec::with_capacity(self.config.workers_per_source);
        for _ in 0..self.config.workers_per_source {
            let coordinator = self.clone();
            let rx = rx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match item {
                        Some(item) => {
                            coordinator.process_one(item).await;
                            coordinator.in_flight.fetch_sub(1, Ordering::SeqCst);
                        }
                        None => break,
                    }
                }
            }));
        }
        info!(source = source.as_str(), "spawned ingestion worker pool");
        SourceQueue { sender: tx, workers }
    }

    /// Gracefully drain every source queue: close the sender half (dropping
    /// it here is sufficient since senders are only ever held by `submit`
    /// callers through `Arc<Self>`) and await every worker to exit after the
    /// channel empties.
    pub async fn shutdown(self: &Arc<Self>) {
        let mut queues = self.queues.lock().await;
        for (_, queue) in queues.drain() {
            drop(queue.sender);
            for worker in queue.workers {
                let _ = worker.await;
            }
        }
    }

    #[instrument(skip(self, item), fields(source = item.source.as_str(), source_id = %item.source_id))]
    async fn process_one(&self, item: RawItem) {
        if let Err(reason) = self.try_process(&item).await {
            error!(error = %reason, "ingestion item failed");
            self.mark_failed(&item, &reason.to_string()).await;
        }
    }

    /// Run the extract/anonymize/chunk/embed/upsert pipeline synchronously and
    /// return the committed document (§4.6's "single admin upload: synchronous
    /// ingestion" path, distinct from `submit`'s fire-and-forget queue).
    #[instrument(skip(self, item), fields(source = item.source.as_str(), source_id = %item.source_id))]
    pub async fn process_now(&self, item: RawItem) -> crate::error::Result<Document> {
        match self.try_process(&item).await {
            Ok(document) => Ok(document),
            Err(reason) => {
                self.mark_failed(&item, &reason.to_string()).await;
                Err(reason)
            }
        }
    }

    async fn try_process(&self, item: &RawItem) -> crate::error::Result<Document> {
        // Extract: for this crate, the collector has already produced plain
        // text content; "extraction" here is the presence check (§4.6).
        if item.content.trim().is_empty() {
            return Err(crate::error::Error::validation("extracted content is empty"));
        }

        let text = if self.config.pii_enabled {
            anonymize(&item.content, self.config.pii_strategy, "[REDACTED]", self.config.pii_min_score, &self.gazetteer).text
        } else {
            item.content.clone()
        };

        let text_chunks = chunk_text(&text, self.config.chunker);
        if text_chunks.is_empty() {
            return Err(crate::error::Error::validation("no chunks produced from content"));
        }

        let embeddings = self
            .embedding_client
            .embed(&text_chunks.iter().map(|c| c.content.clone()).collect::<Vec<_>>())
            .await
            .map_err(|e| crate::error::Error::upstream(format!("embedding failed: {e}")))?;

        if embeddings.len() != text_chunks.len() {
            return Err(crate::error::Error::internal("embedding count mismatch"));
        }

        let document_id = self
            .vector_store
            .find_by_source_id(item.source, &item.source_id)
            .await?
            .map(|doc| doc.id)
            .unwrap_or_else(Uuid::new_v4);

        let now = chrono::Utc::now();
        let document = Document {
            id: document_id,
            title: item.title.clone(),
            source: item.source,
            source_id: item.source_id.clone(),
            content: text,
            metadata: item.metadata.clone(),
            processing_status: ProcessingStatus::Completed,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        let chunks: Vec<Chunk> = text_chunks
            .into_iter()
            .zip(embeddings.into_iter())
            .enumerate()
            .map(|(index, (text_chunk, embedding))| Chunk {
                id: Uuid::new_v4(),
                document_id,
                chunk_index: index,
                content: text_chunk.content,
                embedding: Some(embedding),
                token_count: text_chunk.token_count,
                created_at: now,
            })
            .collect();

        self.vector_store.upsert_document(document.clone(), chunks).await?;
        Ok(document)
    }

    async fn mark_failed(&self, item: &RawItem, reason: &str) {
        if let Ok(Some(existing)) = self.vector_store.find_by_source_id(item.source, &item.source_id).await {
            let mut failed = existing;
            failed.processing_status = ProcessingStatus::Failed;
            failed.failure_reason = Some(reason.to_string());
            failed.updated_at = chrono::Utc::now();
            let _ = self.vector_store.upsert_document(failed, Vec::new()).await;
        } else {
            let mut doc = Document::new_pending(&item.title, item.source, &item.source_id);
            doc.processing_status = ProcessingStatus::Failed;
            doc.failure_reason = Some(reason.to_string());
            let _ = self.vector_store.upsert_document(doc, Vec::new()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::EmbeddingClient;
    use crate::store::InMemoryVectorStore;
    use async_trait::async_trait;

    struct FixedEmbeddingClient;

    #[async_trait]
    impl EmbeddingClient for FixedEmbeddingClient {
        async fn embed(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
    }

    fn test_coordinator() -> Arc<IngestionCoordinator> {
        IngestionCoordinator::new(
            IngestionConfig { workers_per_source: 2, ..IngestionConfig::default() },
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(FixedEmbeddingClient),
            Arc::new(Gazetteer::default()),
        )
    }

    #[tokio::test]
    async fn submitting_item_eventually_completes_and_is_searchable() {
        let coordinator = test_coordinator();
        coordinator
            .submit(RawItem {
                title: "refund policy".to_string(),
                source: Source::AdminUpload,
                source_id: "doc-1".to_string(),
                content: "Refunds are issued within 5 business days of the request.".to_string(),
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        for _ in 0..50 {
            if coordinator.in_flight_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let found = coordinator.vector_store.find_by_source_id(Source::AdminUpload, "doc-1").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().processing_status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn second_arrival_with_same_source_id_replaces_document() {
        let coordinator = test_coordinator();
        for content in ["first version of the policy.", "second, updated version of the policy."] {
            coordinator
                .submit(RawItem {
                    title: "policy".to_string(),
                    source: Source::Slack,
                    source_id: "chan1_1700000000".to_string(),
                    content: content.to_string(),
                    metadata: serde_json::json!({}),
                })
                .await
                .unwrap();
            for _ in 0..50 {
                if coordinator.in_flight_count() == 0 {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        }

        let listing = coordinator.vector_store.list_documents(Default::default(), Default::default()).await.unwrap();
        let matching: Vec<_> = listing.items.iter().filter(|d| d.source_id == "chan1_1700000000").collect();
        assert_eq!(matching.len(), 1);
        assert!(matching[0].content.contains("second"));
    }

    #[tokio::test]
    async fn empty_content_is_marked_failed_with_no_chunks() {
        let coordinator = test_coordinator();
        coordinator
            .submit(RawItem {
                title: "empty".to_string(),
                source: Source::AdminUpload,
                source_id: "doc-empty".to_string(),
                content: "   ".to_string(),
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        for _ in 0..50 {
            if coordinator.in_flight_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let found = coordinator.vector_store.find_by_source_id(Source::AdminUpload, "doc-empty").await.unwrap().unwrap();
        assert_eq!(found.processing_status, ProcessingStatus::Failed);
        assert!(found.failure_reason.is_some());
    }
}
