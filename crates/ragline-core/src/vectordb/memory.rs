//! In-memory [`VectorStore`] implementation for tests and single-process use.
//!
//! Uses `HashMap` and `BTreeMap` behind `std::sync::RwLock` for thread
//! safety. Search is brute-force over every point in the collection.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::{cosine_similarity, dot_product};
use crate::error::{RagError, Result};
use crate::models::{CollectionInfo, Distance, Metadata, RetrievedDocument, VectorRecord};

use super::{check_dimension, VectorStore};

struct StoredPoint {
    vector: Vec<f32>,
    text: String,
    metadata: Option<Metadata>,
}

struct Collection {
    vector_size: usize,
    points: BTreeMap<u64, StoredPoint>,
    next_id: u64,
}

/// In-memory vector store.
pub struct InMemoryVectorStore {
    distance: Distance,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new(distance: Distance) -> Self {
        Self {
            distance,
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.distance {
            Distance::Cosine => cosine_similarity(a, b),
            Distance::Dot => dot_product(a, b),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(Distance::Cosine)
    }
}

fn poisoned() -> RagError {
    RagError::Store("in-memory vector store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.contains_key(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let collection = collections
            .get(name)
            .ok_or_else(|| RagError::NotFound(format!("collection '{}'", name)))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            vector_size: collection.vector_size,
            distance: self.distance,
            points_count: collection.points.len() as u64,
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        Ok(collections.remove(name).is_some())
    }

    async fn put_collection(&self, name: &str, embedding_size: usize) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        collections.entry(name.to_string()).or_insert(Collection {
            vector_size: embedding_size,
            points: BTreeMap::new(),
            next_id: 0,
        });
        Ok(())
    }

    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::NotFound(format!("collection '{}'", name)))?;

        for record in records {
            if record.vector.len() != collection.vector_size {
                return Err(RagError::DimensionMismatch {
                    expected: collection.vector_size,
                    actual: record.vector.len(),
                });
            }
        }

        for record in records {
            let id = match record.id {
                Some(id) => id,
                None => {
                    while collection.points.contains_key(&collection.next_id) {
                        collection.next_id += 1;
                    }
                    collection.next_id
                }
            };
            collection.points.insert(
                id,
                StoredPoint {
                    vector: record.vector.clone(),
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                },
            );
        }
        Ok(())
    }

    async fn search_by_vector(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let collection = collections
            .get(name)
            .ok_or_else(|| RagError::NotFound(format!("collection '{}'", name)))?;
        check_dimension(collection.vector_size, vector.len())?;

        let mut scored: Vec<(f32, &StoredPoint)> = collection
            .points
            .values()
            .map(|p| (self.score(vector, &p.vector), p))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, p)| RetrievedDocument {
                text: p.text.clone(),
                score: score as f64,
                metadata: p.metadata.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    fn vectors(n: usize, dims: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                let mut v = vec![0.0; dims];
                v[i % dims] = 1.0;
                v
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_collection_is_idempotent_without_reset() {
        let store = InMemoryVectorStore::default();
        assert!(store.create_collection("c", 3, false).await.unwrap());
        store
            .insert_one("c", "a", vec![1.0, 0.0, 0.0], None, None)
            .await
            .unwrap();

        assert!(!store.create_collection("c", 3, false).await.unwrap());
        let info = store.get_collection_info("c").await.unwrap();
        assert_eq!(info.points_count, 1);
    }

    #[tokio::test]
    async fn test_create_collection_with_reset_empties_it() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 3, false).await.unwrap();
        store
            .insert_one("c", "a", vec![1.0, 0.0, 0.0], None, None)
            .await
            .unwrap();

        assert!(store.create_collection("c", 3, true).await.unwrap());
        assert_eq!(store.get_collection_info("c").await.unwrap().points_count, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_collection_is_noop() {
        let store = InMemoryVectorStore::default();
        assert!(!store.delete_collection("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_info_missing_collection_is_not_found() {
        let store = InMemoryVectorStore::default();
        assert!(matches!(
            store.get_collection_info("nope").await,
            Err(RagError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_one_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 4, false).await.unwrap();
        let err = store
            .insert_one("c", "a", vec![1.0, 0.0, 0.0], None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_insert_many_batches_and_counts() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 4, false).await.unwrap();
        let n = store
            .insert_many("c", &texts(7), &vectors(7, 4), &[], &[], 3)
            .await
            .unwrap();
        assert_eq!(n, 7);
        assert_eq!(store.get_collection_info("c").await.unwrap().points_count, 7);
    }

    #[tokio::test]
    async fn test_insert_many_length_mismatch() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 4, false).await.unwrap();
        let err = store
            .insert_many("c", &texts(3), &vectors(2, 4), &[], &[], 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
    }

    #[tokio::test]
    async fn test_insert_many_dimension_error_after_first_batch_is_partial() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 4, false).await.unwrap();
        let mut vs = vectors(4, 4);
        vs[3] = vec![1.0, 0.0];
        let err = store
            .insert_many("c", &texts(4), &vs, &[], &[], 2)
            .await
            .unwrap_err();
        assert_eq!(err.inserted(), Some(2));
        assert_eq!(store.get_collection_info("c").await.unwrap().points_count, 2);
    }

    #[tokio::test]
    async fn test_upsert_with_same_id_replaces() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 2, false).await.unwrap();
        let ids = [10u64, 11];
        let vs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        store
            .insert_many("c", &texts(2), &vs, &[], &ids, 50)
            .await
            .unwrap();
        store
            .insert_many("c", &texts(2), &vs, &[], &ids, 50)
            .await
            .unwrap();
        assert_eq!(store.get_collection_info("c").await.unwrap().points_count, 2);
    }

    #[tokio::test]
    async fn test_search_orders_by_score_and_limits() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 2, false).await.unwrap();
        let ts = vec!["east".to_string(), "north".to_string(), "northeast".to_string()];
        let vs = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
        store.insert_many("c", &ts, &vs, &[], &[], 50).await.unwrap();

        let hits = store.search_by_vector("c", &[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "north");
        assert_eq!(hits[1].text, "northeast");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_empty_collection_returns_empty() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 2, false).await.unwrap();
        let hits = store.search_by_vector("c", &[0.0, 1.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_round_trips_through_search() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 2, false).await.unwrap();
        let mut meta = Metadata::new();
        meta.insert("page".into(), serde_json::json!(3));
        store
            .insert_one("c", "a", vec![1.0, 0.0], Some(meta.clone()), None)
            .await
            .unwrap();
        let hits = store.search_by_vector("c", &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].metadata.as_ref(), Some(&meta));
    }

    #[tokio::test]
    async fn test_search_rejects_query_of_other_dimension() {
        let store = InMemoryVectorStore::default();
        store.create_collection("c", 3, false).await.unwrap();
        store
            .insert_many("c", &texts(2), &vectors(2, 3), &[], &[], 50)
            .await
            .unwrap();

        assert!(matches!(
            store.search_by_vector("c", &[1.0, 0.0], 1).await,
            Err(RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }
}
