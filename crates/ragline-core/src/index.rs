//! Indexing orchestrator.
//!
//! Rebuilds a project's vector collection from the chunks held in the
//! document store:
//!
//! 1. Validate the project and take its index lock (one indexing run per
//!    project at a time; search never waits on it).
//! 2. If `do_reset`, drop the collection once, before any page is read.
//! 3. Page through the project's chunks. For each page, embed every chunk
//!    in [`EmbedMode::Document`] with bounded concurrency, ensure the
//!    collection exists (never destructively), and insert the page.
//! 4. Stop at an empty page, a short page, or once the chunk count taken
//!    before the loop has been reached.
//!
//! Vector record ids are the chunk ids, so re-indexing the same chunks
//! replaces records instead of duplicating them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::docstore::DocumentStore;
use crate::embedding::{EmbedMode, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{collection_name, validate_project_id, Chunk, CollectionInfo, Metadata};
use crate::vectordb::{partial, VectorStore};

/// Registry of per-project async locks.
///
/// An entry lives only while some task holds or waits for it; the last
/// [`IndexGuard`] to drop removes it, so the map does not grow with every
/// project ever indexed.
#[derive(Default)]
pub struct IndexLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IndexLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock of `project_id`.
    pub async fn acquire(&self, project_id: &str) -> Result<IndexGuard<'_>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| RagError::Store("index lock registry poisoned".to_string()))?;
            locks
                .entry(project_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        Ok(IndexGuard {
            registry: self,
            project_id: project_id.to_string(),
            guard: Some(guard),
        })
    }

    /// Number of projects with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    fn release(&self, project_id: &str) {
        // Waiters hold a clone of the Arc, so a count of 1 means only the
        // map references it.
        if let Ok(mut locks) = self.locks.lock() {
            if locks
                .get(project_id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(project_id);
            }
        }
    }
}

/// Held lock of one project; releases and prunes on drop.
pub struct IndexGuard<'a> {
    registry: &'a IndexLocks,
    project_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IndexGuard<'_> {
    fn drop(&mut self) {
        // The owned guard keeps its own Arc clone; drop it before pruning.
        drop(self.guard.take());
        self.registry.release(&self.project_id);
    }
}

/// Tunables for [`Indexer`].
#[derive(Debug, Clone, Copy)]
pub struct IndexSettings {
    /// Chunks fetched from the document store per page.
    pub page_size: u32,
    /// Records per vector-store batch.
    pub insert_batch_size: usize,
    /// Concurrent embedding requests within a page.
    pub embed_concurrency: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            insert_batch_size: 50,
            embed_concurrency: 4,
        }
    }
}

pub struct Indexer {
    docs: Arc<dyn DocumentStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    locks: Arc<IndexLocks>,
    settings: IndexSettings,
}

impl Indexer {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        locks: Arc<IndexLocks>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            docs,
            vectors,
            embedder,
            locks,
            settings,
        }
    }

    /// Index every chunk of `project_id`, returning the number of records
    /// written.
    ///
    /// A failure after some records were written is reported as
    /// `RagError::PartialFailure` with the count so far. Nothing is rolled
    /// back; the caller may resubmit.
    pub async fn push_index(&self, project_id: &str, do_reset: bool) -> Result<usize> {
        validate_project_id(project_id)?;
        let project = self.docs.get_or_create_project(project_id).await?;
        let _guard = self.locks.acquire(project_id).await?;

        let embedding_size = self.embedder.embedding_size().ok_or_else(|| {
            RagError::Configuration("embedding model was not selected".to_string())
        })?;
        let collection = collection_name(project_id);

        if do_reset {
            let existed = self.vectors.delete_collection(&collection).await?;
            info!(collection = %collection, existed, "collection reset");
        }

        let expected = self.docs.count_chunks(project.id).await?;
        let page_size = self.settings.page_size.max(1);
        let mut inserted = 0usize;
        let mut seen = 0u64;
        let mut page_no = 1u32;

        while seen < expected {
            let page = self
                .docs
                .get_chunk_page(project.id, page_no, page_size)
                .await
                .map_err(|e| partial(inserted, e))?;
            if page.is_empty() {
                break;
            }
            seen += page.len() as u64;

            let written = self
                .index_page(&collection, embedding_size, &page)
                .await
                .map_err(|e| {
                    warn!(collection = %collection, page_no, error = %e, "indexing page failed");
                    partial(inserted, e)
                })?;
            inserted += written;
            debug!(collection = %collection, page_no, written, inserted, "page indexed");

            if page.len() < page_size as usize {
                break;
            }
            page_no += 1;
        }

        info!(project = project_id, inserted, "index push complete");
        Ok(inserted)
    }

    async fn index_page(
        &self,
        collection: &str,
        embedding_size: usize,
        page: &[Chunk],
    ) -> Result<usize> {
        let embeddings: Vec<_> = page
            .iter()
            .map(|chunk| {
                let embedder = Arc::clone(&self.embedder);
                let text = chunk.text.clone();
                async move { embedder.embed_text(&text, EmbedMode::Document).await }
            })
            .collect();
        let vectors: Vec<Vec<f32>> = stream::iter(embeddings)
            .buffered(self.settings.embed_concurrency.max(1))
            .try_collect()
            .await?;

        let texts: Vec<String> = page.iter().map(|c| c.text.clone()).collect();
        let metadatas: Vec<Metadata> = page.iter().map(|c| c.metadata.clone()).collect();
        let ids: Vec<u64> = page.iter().map(|c| c.id as u64).collect();

        if self
            .vectors
            .create_collection(collection, embedding_size, false)
            .await?
        {
            info!(collection, embedding_size, "collection created");
        }

        self.vectors
            .insert_many(
                collection,
                &texts,
                &vectors,
                &metadatas,
                &ids,
                self.settings.insert_batch_size,
            )
            .await
    }

    /// Describe the project's collection; `RagError::NotFound` if it has
    /// never been indexed.
    pub async fn get_index_info(&self, project_id: &str) -> Result<CollectionInfo> {
        validate_project_id(project_id)?;
        self.vectors
            .get_collection_info(&collection_name(project_id))
            .await
    }

    /// Drop the project's collection. Returns whether one existed.
    pub async fn reset_index(&self, project_id: &str) -> Result<bool> {
        validate_project_id(project_id)?;
        let _guard = self.locks.acquire(project_id).await?;
        let collection = collection_name(project_id);
        let existed = self.vectors.delete_collection(&collection).await?;
        info!(collection = %collection, existed, "collection deleted");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::memory::InMemoryDocumentStore;
    use crate::models::NewChunk;
    use crate::testing::{BagOfWordsEmbedder, FlakyVectorStore};
    use crate::vectordb::memory::InMemoryVectorStore;

    async fn seed(docs: &InMemoryDocumentStore, project_id: &str, n: usize) {
        let project = docs.get_or_create_project(project_id).await.unwrap();
        let chunks: Vec<NewChunk> = (1..=n as i64)
            .map(|order| NewChunk {
                project_id: project.id,
                asset_id: Some(1),
                order,
                text: format!("chunk number {} about topic {}", order, order % 3),
                metadata: Metadata::new(),
            })
            .collect();
        docs.insert_chunks(&chunks).await.unwrap();
    }

    fn indexer(
        docs: Arc<InMemoryDocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<BagOfWordsEmbedder>,
        page_size: u32,
    ) -> Indexer {
        indexer_with_locks(docs, vectors, embedder, page_size, Arc::new(IndexLocks::new()))
    }

    fn indexer_with_locks(
        docs: Arc<InMemoryDocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<BagOfWordsEmbedder>,
        page_size: u32,
        locks: Arc<IndexLocks>,
    ) -> Indexer {
        Indexer::new(
            docs,
            vectors,
            embedder,
            locks,
            IndexSettings {
                page_size,
                insert_batch_size: 50,
                embed_concurrency: 3,
            },
        )
    }

    #[tokio::test]
    async fn test_reset_applies_only_before_first_page() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 15).await;
        let vectors = Arc::new(InMemoryVectorStore::default());
        let idx = indexer(docs, vectors.clone(), Arc::new(BagOfWordsEmbedder::new(16)), 10);

        let inserted = idx.push_index("p1", true).await.unwrap();
        assert_eq!(inserted, 15);
        let info = vectors.get_collection_info("collection_p1").await.unwrap();
        assert_eq!(info.points_count, 15);
    }

    #[tokio::test]
    async fn test_reset_then_plain_push_does_not_duplicate() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 23).await;
        let vectors = Arc::new(InMemoryVectorStore::default());
        let idx = indexer(docs, vectors.clone(), Arc::new(BagOfWordsEmbedder::new(16)), 10);

        idx.push_index("p1", false).await.unwrap();
        idx.push_index("p1", true).await.unwrap();
        let single = vectors
            .get_collection_info("collection_p1")
            .await
            .unwrap()
            .points_count;

        idx.push_index("p1", false).await.unwrap();
        let after = vectors
            .get_collection_info("collection_p1")
            .await
            .unwrap()
            .points_count;
        assert_eq!(single, 23);
        assert_eq!(after, single);
    }

    #[tokio::test]
    async fn test_embeds_in_document_mode_in_chunk_order() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 7).await;
        let embedder = Arc::new(BagOfWordsEmbedder::new(16));
        let idx = indexer(
            docs,
            Arc::new(InMemoryVectorStore::default()),
            embedder.clone(),
            5,
        );
        idx.push_index("p1", false).await.unwrap();

        let modes = embedder.modes.lock().unwrap();
        assert_eq!(modes.len(), 7);
        assert!(modes.iter().all(|m| *m == EmbedMode::Document));
    }

    #[tokio::test]
    async fn test_empty_project_inserts_nothing() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let vectors = Arc::new(InMemoryVectorStore::default());
        let idx = indexer(docs, vectors.clone(), Arc::new(BagOfWordsEmbedder::new(8)), 10);
        assert_eq!(idx.push_index("empty", false).await.unwrap(), 0);
        assert!(matches!(
            idx.get_index_info("empty").await,
            Err(RagError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unselected_embedding_model_is_configuration_error() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 3).await;
        let idx = indexer(
            docs,
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(BagOfWordsEmbedder::unbound()),
            10,
        );
        assert!(matches!(
            idx.push_index("p1", false).await,
            Err(RagError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_project_id_rejected() {
        let idx = indexer(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(BagOfWordsEmbedder::new(8)),
            10,
        );
        assert!(matches!(
            idx.push_index("not valid!", false).await,
            Err(RagError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_on_later_page_reports_count_so_far() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 25).await;
        let vectors = Arc::new(FlakyVectorStore::failing_batch(3));
        let idx = indexer(docs, vectors.clone(), Arc::new(BagOfWordsEmbedder::new(8)), 10);

        let err = idx.push_index("p1", false).await.unwrap_err();
        assert_eq!(err.inserted(), Some(20));
        let info = vectors.get_collection_info("collection_p1").await.unwrap();
        assert_eq!(info.points_count, 20);
    }

    #[tokio::test]
    async fn test_reset_index_deletes_collection() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 4).await;
        let vectors = Arc::new(InMemoryVectorStore::default());
        let idx = indexer(docs, vectors.clone(), Arc::new(BagOfWordsEmbedder::new(8)), 10);
        idx.push_index("p1", false).await.unwrap();

        assert!(idx.reset_index("p1").await.unwrap());
        assert!(!idx.reset_index("p1").await.unwrap());
        assert!(!vectors.collection_exists("collection_p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_pushes_for_one_project_serialize() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 30).await;
        let vectors = Arc::new(InMemoryVectorStore::default());
        let idx = Arc::new(indexer(
            docs,
            vectors.clone(),
            Arc::new(BagOfWordsEmbedder::new(8)),
            7,
        ));

        let a = tokio::spawn({
            let idx = idx.clone();
            async move { idx.push_index("p1", true).await }
        });
        let b = tokio::spawn({
            let idx = idx.clone();
            async move { idx.push_index("p1", true).await }
        });
        assert_eq!(a.await.unwrap().unwrap(), 30);
        assert_eq!(b.await.unwrap().unwrap(), 30);
        let info = vectors.get_collection_info("collection_p1").await.unwrap();
        assert_eq!(info.points_count, 30);
    }

    #[tokio::test]
    async fn test_document_text_is_truncated_before_embedding() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 3).await;
        let embedder = Arc::new(BagOfWordsEmbedder::new(8).with_max_chars(12));
        let idx = indexer(
            docs,
            Arc::new(InMemoryVectorStore::default()),
            embedder.clone(),
            10,
        );
        idx.push_index("p1", false).await.unwrap();

        let sent = embedder.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], "chunk number");
        assert!(sent.iter().all(|t| t.chars().count() <= 12));
    }

    #[tokio::test]
    async fn test_lock_entries_are_pruned_after_release() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        seed(&docs, "p1", 4).await;
        seed(&docs, "p2", 4).await;
        let locks = Arc::new(IndexLocks::new());
        let idx = indexer_with_locks(
            docs,
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(BagOfWordsEmbedder::new(8)),
            10,
            locks.clone(),
        );

        idx.push_index("p1", false).await.unwrap();
        idx.push_index("p2", true).await.unwrap();
        idx.reset_index("p1").await.unwrap();
        assert_eq!(locks.tracked(), 0);

        let held = locks.acquire("p3").await.unwrap();
        assert_eq!(locks.tracked(), 1);
        drop(held);
        assert_eq!(locks.tracked(), 0);
    }
}
