//! Document store abstraction.
//!
//! The [`DocumentStore`] trait holds projects, assets, and the text chunks
//! produced by processing. The indexer reads chunks back from it page by
//! page. The app crate provides a SQLite implementation; [`memory`] holds
//! one for tests.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Asset, Chunk, NewAsset, NewChunk, Project};

/// Abstract relational store for projects, assets, and chunks.
///
/// # Ordering
///
/// [`get_chunk_page`](DocumentStore::get_chunk_page) returns chunks ordered
/// by `(asset_id, order, id)` so paging is stable while no writes happen.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a project, creating it on first reference.
    ///
    /// Fails with `RagError::Validation` for a non-alphanumeric identifier.
    async fn get_or_create_project(&self, project_id: &str) -> Result<Project>;

    /// Fetch an existing project without creating it.
    async fn get_project(&self, project_id: &str) -> Result<Option<Project>>;

    /// One page of projects (1-based) plus the total number of pages.
    async fn list_projects(&self, page: u32, page_size: u32) -> Result<(Vec<Project>, u32)>;

    /// Record an asset. An asset with the same name in the same project is
    /// replaced in place and keeps its id.
    async fn create_asset(&self, asset: &NewAsset) -> Result<Asset>;

    async fn get_asset(&self, project_id: i64, name: &str) -> Result<Option<Asset>>;

    async fn list_assets(&self, project_id: i64) -> Result<Vec<Asset>>;

    /// Insert chunks, returning how many were written.
    async fn insert_chunks(&self, chunks: &[NewChunk]) -> Result<usize>;

    /// Delete every chunk of a project, returning how many were removed.
    async fn delete_chunks_by_project(&self, project_id: i64) -> Result<u64>;

    /// Delete every chunk of one asset, returning how many were removed.
    async fn delete_chunks_by_asset(&self, project_id: i64, asset_id: i64) -> Result<u64>;

    /// One page (1-based) of a project's chunks. A page past the end is empty.
    async fn get_chunk_page(&self, project_id: i64, page_no: u32, page_size: u32)
        -> Result<Vec<Chunk>>;

    /// Number of chunks a project currently has.
    async fn count_chunks(&self, project_id: i64) -> Result<u64>;
}

/// Total pages needed for `total` items at `page_size` per page.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64) as u32
}
