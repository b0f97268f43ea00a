//! Core data models that flow through the processing, indexing, and
//! retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Free-form chunk metadata (page number, source file, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A namespace owning assets and chunks. Created on first reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Internal surrogate id.
    pub id: i64,
    /// Caller-facing identifier (ASCII alphanumeric).
    pub project_id: String,
}

/// Kind of ingested source. Only files are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    File,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::File => "file",
        }
    }
}

/// One ingested source document belonging to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub id: i64,
    pub project_id: i64,
    pub asset_type: AssetType,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// Asset to be recorded; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub project_id: i64,
    pub asset_type: AssetType,
    pub name: String,
    pub size: u64,
}

/// A persisted slice of an asset's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: i64,
    pub project_id: i64,
    pub asset_id: Option<i64>,
    /// 1-based position, unique within (project, asset).
    pub order: i64,
    pub text: String,
    pub metadata: Metadata,
}

/// Chunk to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub project_id: i64,
    pub asset_id: Option<i64>,
    pub order: i64,
    pub text: String,
    pub metadata: Metadata,
}

/// Similarity metric, fixed when a collection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "cosine",
            Distance::Dot => "dot",
        }
    }
}

impl std::str::FromStr for Distance {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "dot" => Ok(Distance::Dot),
            other => Err(RagError::Validation(format!(
                "unknown distance method '{}'; use cosine or dot",
                other
            ))),
        }
    }
}

/// One embedded chunk as written to a vector collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Record id; the backend assigns one when absent.
    pub id: Option<u64>,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Option<Metadata>,
}

/// A similarity-search hit. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub score: f64,
    pub metadata: Option<Metadata>,
}

/// Collection description returned by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub vector_size: usize,
    pub distance: Distance,
    pub points_count: u64,
}

/// Chat role of a [`PromptMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A role-tagged message in a chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Reject identifiers that are empty or not ASCII alphanumeric.
pub fn validate_project_id(project_id: &str) -> Result<()> {
    if project_id.is_empty() {
        return Err(RagError::Validation(
            "project_id must not be empty".to_string(),
        ));
    }
    if !project_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RagError::Validation(format!(
            "project_id must be alphanumeric, got '{}'",
            project_id
        )));
    }
    Ok(())
}

/// Vector collection name for a project. Pure function of the identifier.
///
/// ```rust
/// assert_eq!(ragline_core::models::collection_name("abc123"), "collection_abc123");
/// ```
pub fn collection_name(project_id: &str) -> String {
    format!("collection_{}", project_id.trim())
}
