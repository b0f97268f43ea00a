//! Vector database abstraction.
//!
//! The [`VectorStore`] trait covers the primitive operations a backend must
//! provide (existence checks, create/delete, batch upsert, nearest-neighbour
//! search). Collection lifecycle with reset semantics and batched insertion
//! with dimension checking are provided methods built on those primitives,
//! so every backend shares one implementation of them.
//!
//! Implementations must be `Send + Sync` to be shared across request
//! handlers.

pub mod memory;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::models::{CollectionInfo, Metadata, RetrievedDocument, VectorRecord};

/// Abstract vector database.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_collection`](VectorStore::create_collection) | Ensure a collection exists, optionally resetting it |
/// | [`delete_collection`](VectorStore::delete_collection) | Drop a collection (no-op when absent) |
/// | [`get_collection_info`](VectorStore::get_collection_info) | Size, metric, and point count |
/// | [`insert_one`](VectorStore::insert_one) | Insert a single record |
/// | [`insert_many`](VectorStore::insert_many) | Batched insert with partial-failure accounting |
/// | [`search_by_vector`](VectorStore::search_by_vector) | Top-k similarity search |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Describe a collection. Fails with `RagError::NotFound` if absent.
    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Drop a collection. Returns `false` (not an error) when it was absent.
    async fn delete_collection(&self, name: &str) -> Result<bool>;

    /// Create an empty collection. Callers guarantee it does not exist.
    async fn put_collection(&self, name: &str, embedding_size: usize) -> Result<()>;

    /// Write one batch of records. Records with an id replace any existing
    /// record with that id.
    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()>;

    /// Up to `limit` hits, best first. An empty collection yields an empty
    /// list; a missing one fails with `RagError::NotFound`.
    async fn search_by_vector(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Ensure `name` exists with `embedding_size` dimensions.
    ///
    /// With `do_reset`, an existing collection is dropped first. Returns
    /// `true` iff a new collection was created by this call; an existing
    /// collection is left untouched when `do_reset` is false.
    async fn create_collection(
        &self,
        name: &str,
        embedding_size: usize,
        do_reset: bool,
    ) -> Result<bool> {
        if do_reset {
            self.delete_collection(name).await?;
        }
        if self.collection_exists(name).await? {
            return Ok(false);
        }
        debug!(collection = name, embedding_size, "creating collection");
        self.put_collection(name, embedding_size).await?;
        Ok(true)
    }

    /// Insert a single record after checking its dimensionality.
    async fn insert_one(
        &self,
        name: &str,
        text: &str,
        vector: Vec<f32>,
        metadata: Option<Metadata>,
        record_id: Option<u64>,
    ) -> Result<()> {
        let info = self.get_collection_info(name).await?;
        check_dimension(info.vector_size, vector.len())?;
        let record = VectorRecord {
            id: record_id,
            vector,
            text: text.to_string(),
            metadata,
        };
        self.upsert_batch(name, std::slice::from_ref(&record)).await
    }

    /// Insert parallel sequences of texts, vectors, metadata, and ids in
    /// groups of `batch_size`.
    ///
    /// `metadatas` and `record_ids` may be empty, meaning "none"; otherwise
    /// every sequence must have the same length as `texts`. Returns the
    /// number of records inserted.
    ///
    /// A failing batch stops the operation. If earlier batches were already
    /// written, the error is `RagError::PartialFailure` carrying that count,
    /// so the caller can tell a clean failure from a half-written one.
    async fn insert_many(
        &self,
        name: &str,
        texts: &[String],
        vectors: &[Vec<f32>],
        metadatas: &[Metadata],
        record_ids: &[u64],
        batch_size: usize,
    ) -> Result<usize> {
        if vectors.len() != texts.len() {
            return Err(RagError::Validation(format!(
                "{} texts but {} vectors",
                texts.len(),
                vectors.len()
            )));
        }
        if !metadatas.is_empty() && metadatas.len() != texts.len() {
            return Err(RagError::Validation(format!(
                "{} texts but {} metadata entries",
                texts.len(),
                metadatas.len()
            )));
        }
        if !record_ids.is_empty() && record_ids.len() != texts.len() {
            return Err(RagError::Validation(format!(
                "{} texts but {} record ids",
                texts.len(),
                record_ids.len()
            )));
        }
        if texts.is_empty() {
            return Ok(0);
        }

        let info = self.get_collection_info(name).await?;
        let batch_size = batch_size.max(1);
        let mut inserted = 0usize;

        for start in (0..texts.len()).step_by(batch_size) {
            let end = (start + batch_size).min(texts.len());
            let result: Result<()> = async {
                let mut batch = Vec::with_capacity(end - start);
                for i in start..end {
                    check_dimension(info.vector_size, vectors[i].len())?;
                    batch.push(VectorRecord {
                        id: record_ids.get(i).copied(),
                        vector: vectors[i].clone(),
                        text: texts[i].clone(),
                        metadata: metadatas.get(i).cloned(),
                    });
                }
                self.upsert_batch(name, &batch).await
            }
            .await;

            if let Err(cause) = result {
                return Err(partial(inserted, cause));
            }
            inserted += end - start;
            debug!(collection = name, inserted, "batch written");
        }

        Ok(inserted)
    }
}

/// Wrap `cause` as a partial failure when anything was already written.
pub fn partial(inserted: usize, cause: RagError) -> RagError {
    if inserted == 0 {
        return cause;
    }
    match cause {
        RagError::PartialFailure {
            inserted: inner,
            cause,
        } => RagError::PartialFailure {
            inserted: inserted + inner,
            cause,
        },
        other => RagError::PartialFailure {
            inserted,
            cause: Box::new(other),
        },
    }
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RagError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
