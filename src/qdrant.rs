//! Qdrant [`VectorStore`] over the `qdrant-client` gRPC client.
//!
//! Points carry a `{ "text", "metadata" }` payload. Records without an id
//! get a random UUID, which Qdrant accepts alongside unsigned integer ids.
//! Upserts wait for the write so a successful insert is immediately
//! searchable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, vectors_config, CreateCollectionBuilder,
    PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::{json, Value};
use tracing::debug;

use ragline_core::error::{RagError, Result};
use ragline_core::models::{CollectionInfo, Distance, Metadata, RetrievedDocument, VectorRecord};
use ragline_core::vectordb::VectorStore;

pub struct QdrantVectorStore {
    client: Qdrant,
    distance: Distance,
}

impl QdrantVectorStore {
    /// `url` is the gRPC endpoint, e.g. `http://localhost:6334`.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        distance: Distance,
        timeout_secs: u64,
    ) -> Result<Self> {
        let mut builder = Qdrant::from_url(url).timeout(Duration::from_secs(timeout_secs));
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Configuration(format!("qdrant client: {}", e)))?;
        Ok(Self { client, distance })
    }
}

fn store_err(e: QdrantError) -> RagError {
    RagError::Store(format!("qdrant: {}", e))
}

fn qdrant_distance(distance: Distance) -> qdrant_client::qdrant::Distance {
    match distance {
        Distance::Cosine => qdrant_client::qdrant::Distance::Cosine,
        Distance::Dot => qdrant_client::qdrant::Distance::Dot,
    }
}

fn to_point(record: &VectorRecord) -> Result<PointStruct> {
    let payload = Payload::try_from(json!({
        "text": record.text,
        "metadata": record.metadata,
    }))
    .map_err(store_err)?;
    let point = match record.id {
        Some(id) => PointStruct::new(id, record.vector.clone(), payload),
        None => PointStruct::new(
            uuid::Uuid::new_v4().to_string(),
            record.vector.clone(),
            payload,
        ),
    };
    Ok(point)
}

fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => json!(i),
        Some(Kind::DoubleValue(d)) => json!(d),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(obj)) => Value::Object(
            obj.fields
                .into_iter()
                .map(|(k, v)| (k, to_json(v)))
                .collect(),
        ),
    }
}

fn to_document(mut payload: HashMap<String, QdrantValue>, score: f32) -> RetrievedDocument {
    let text = match payload.remove("text").map(to_json) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    let metadata: Option<Metadata> = match payload.remove("metadata").map(to_json) {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };
    RetrievedDocument {
        text,
        score: score as f64,
        metadata,
    }
}

fn hit_to_document(hit: ScoredPoint) -> RetrievedDocument {
    to_document(hit.payload, hit.score)
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client.collection_exists(name).await.map_err(store_err)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await.map_err(store_err)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        if !self.collection_exists(name).await? {
            return Err(RagError::NotFound(format!("collection '{}'", name)));
        }
        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(store_err)?
            .result
            .ok_or_else(|| RagError::Store(format!("qdrant returned no info for '{}'", name)))?;

        let params = info
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        let (vector_size, distance) = match params {
            Some(vectors_config::Config::Params(p)) => {
                let distance = match p.distance() {
                    qdrant_client::qdrant::Distance::Dot => Distance::Dot,
                    _ => Distance::Cosine,
                };
                (p.size as usize, distance)
            }
            _ => {
                return Err(RagError::Store(format!(
                    "collection '{}' has no single unnamed vector",
                    name
                )))
            }
        };

        Ok(CollectionInfo {
            name: name.to_string(),
            vector_size,
            distance,
            points_count: info.points_count.unwrap_or(0),
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }
        self.client.delete_collection(name).await.map_err(store_err)?;
        debug!(collection = name, "collection deleted");
        Ok(true)
    }

    async fn put_collection(&self, name: &str, embedding_size: usize) -> Result<()> {
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorParamsBuilder::new(embedding_size as u64, qdrant_distance(self.distance)),
            ))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let points = records.iter().map(to_point).collect::<Result<Vec<_>>>()?;
        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn search_by_vector(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let info = self.get_collection_info(name).await?;
        if info.vector_size != vector.len() {
            return Err(RagError::DimensionMismatch {
                expected: info.vector_size,
                actual: vector.len(),
            });
        }

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, vector.to_vec(), limit as u64).with_payload(true),
            )
            .await
            .map_err(store_err)?;

        Ok(response.result.into_iter().map(hit_to_document).collect())
    }
}
