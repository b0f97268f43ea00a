//! In-memory [`DocumentStore`] for tests.
//!
//! Uses plain `Vec` tables behind a single `std::sync::RwLock`.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{validate_project_id, Asset, Chunk, NewAsset, NewChunk, Project};

use super::{total_pages, DocumentStore};

#[derive(Default)]
struct Tables {
    projects: Vec<Project>,
    assets: Vec<Asset>,
    chunks: Vec<Chunk>,
    next_chunk_id: i64,
}

/// In-memory document store.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    tables: RwLock<Tables>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> RagError {
    RagError::Store("in-memory document store lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_or_create_project(&self, project_id: &str) -> Result<Project> {
        validate_project_id(project_id)?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if let Some(p) = tables.projects.iter().find(|p| p.project_id == project_id) {
            return Ok(p.clone());
        }
        let project = Project {
            id: tables.projects.len() as i64 + 1,
            project_id: project_id.to_string(),
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .projects
            .iter()
            .find(|p| p.project_id == project_id)
            .cloned())
    }

    async fn list_projects(&self, page: u32, page_size: u32) -> Result<(Vec<Project>, u32)> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let pages = total_pages(tables.projects.len() as u64, page_size);
        let skip = (page.max(1) - 1) as usize * page_size as usize;
        let items = tables
            .projects
            .iter()
            .skip(skip)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok((items, pages))
    }

    async fn create_asset(&self, asset: &NewAsset) -> Result<Asset> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let now = chrono::Utc::now().timestamp();
        if let Some(existing) = tables
            .assets
            .iter_mut()
            .find(|a| a.project_id == asset.project_id && a.name == asset.name)
        {
            existing.size = asset.size;
            existing.asset_type = asset.asset_type;
            existing.created_at = now;
            return Ok(existing.clone());
        }
        let created = Asset {
            id: tables.assets.len() as i64 + 1,
            project_id: asset.project_id,
            asset_type: asset.asset_type,
            name: asset.name.clone(),
            size: asset.size,
            created_at: now,
        };
        tables.assets.push(created.clone());
        Ok(created)
    }

    async fn get_asset(&self, project_id: i64, name: &str) -> Result<Option<Asset>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .assets
            .iter()
            .find(|a| a.project_id == project_id && a.name == name)
            .cloned())
    }

    async fn list_assets(&self, project_id: i64) -> Result<Vec<Asset>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .assets
            .iter()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn insert_chunks(&self, chunks: &[NewChunk]) -> Result<usize> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        for c in chunks {
            if c.order < 1 {
                return Err(RagError::Validation(format!(
                    "chunk order must be positive, got {}",
                    c.order
                )));
            }
            let duplicate = tables.chunks.iter().any(|x| {
                x.project_id == c.project_id && x.asset_id == c.asset_id && x.order == c.order
            });
            if duplicate {
                return Err(RagError::Store(format!(
                    "chunk order {} already exists for this asset",
                    c.order
                )));
            }
        }
        for c in chunks {
            tables.next_chunk_id += 1;
            let id = tables.next_chunk_id;
            tables.chunks.push(Chunk {
                id,
                project_id: c.project_id,
                asset_id: c.asset_id,
                order: c.order,
                text: c.text.clone(),
                metadata: c.metadata.clone(),
            });
        }
        Ok(chunks.len())
    }

    async fn delete_chunks_by_project(&self, project_id: i64) -> Result<u64> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let before = tables.chunks.len();
        tables.chunks.retain(|c| c.project_id != project_id);
        Ok((before - tables.chunks.len()) as u64)
    }

    async fn delete_chunks_by_asset(&self, project_id: i64, asset_id: i64) -> Result<u64> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let before = tables.chunks.len();
        tables
            .chunks
            .retain(|c| !(c.project_id == project_id && c.asset_id == Some(asset_id)));
        Ok((before - tables.chunks.len()) as u64)
    }

    async fn get_chunk_page(
        &self,
        project_id: i64,
        page_no: u32,
        page_size: u32,
    ) -> Result<Vec<Chunk>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let mut rows: Vec<&Chunk> = tables
            .chunks
            .iter()
            .filter(|c| c.project_id == project_id)
            .collect();
        rows.sort_by_key(|c| (c.asset_id, c.order, c.id));
        let skip = (page_no.max(1) - 1) as usize * page_size as usize;
        Ok(rows
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn count_chunks(&self, project_id: i64) -> Result<u64> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .chunks
            .iter()
            .filter(|c| c.project_id == project_id)
            .count() as u64)
    }
}
