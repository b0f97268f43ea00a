//! Processing step: turn an asset's text segments into stored chunks.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::chunk::{Segment, TextSplitter};
use crate::docstore::DocumentStore;
use crate::error::Result;
use crate::models::{validate_project_id, AssetType, NewAsset, NewChunk};

/// One asset to split and store.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub asset_name: String,
    /// Source size in bytes.
    pub asset_size: u64,
    pub segments: Vec<Segment>,
    pub chunk_size: usize,
    pub overlap: usize,
    /// Delete all of the project's chunks before inserting.
    pub do_reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub inserted_chunks: usize,
    pub processed_assets: usize,
}

pub struct Processor {
    docs: Arc<dyn DocumentStore>,
}

impl Processor {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    /// Split `req.segments` and persist them as chunks of `req.asset_name`.
    ///
    /// Chunking parameters are validated before anything is written.
    /// Re-processing an asset replaces its previous chunks.
    pub async fn process(&self, project_id: &str, req: &ProcessRequest) -> Result<ProcessReport> {
        validate_project_id(project_id)?;
        let splitter = TextSplitter::new(req.chunk_size, req.overlap)?;
        let project = self.docs.get_or_create_project(project_id).await?;

        if req.do_reset {
            let deleted = self.docs.delete_chunks_by_project(project.id).await?;
            info!(project = project_id, deleted, "project chunks reset");
        }

        let asset = self
            .docs
            .create_asset(&NewAsset {
                project_id: project.id,
                asset_type: AssetType::File,
                name: req.asset_name.clone(),
                size: req.asset_size,
            })
            .await?;
        self.docs.delete_chunks_by_asset(project.id, asset.id).await?;

        let chunks: Vec<NewChunk> = splitter
            .create_documents(&req.segments)
            .into_iter()
            .enumerate()
            .map(|(i, seg)| NewChunk {
                project_id: project.id,
                asset_id: Some(asset.id),
                order: i as i64 + 1,
                text: seg.text,
                metadata: seg.metadata,
            })
            .collect();

        let inserted = self.docs.insert_chunks(&chunks).await?;
        info!(
            project = project_id,
            asset = %asset.name,
            inserted,
            "asset processed"
        );

        Ok(ProcessReport {
            inserted_chunks: inserted,
            processed_assets: 1,
        })
    }
}
