//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Maps each [`DocumentStore`] operation to SQL against the schema created
//! by [`crate::migrate`] (projects, assets, chunks).

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use ragline_core::docstore::{total_pages, DocumentStore};
use ragline_core::error::{RagError, Result};
use ragline_core::models::{
    validate_project_id, Asset, AssetType, Chunk, Metadata, NewAsset, NewChunk, Project,
};

/// SQLite's default bound-parameter limit is 32766; five binds per chunk.
const INSERT_CHUNK_ROWS: usize = 500;

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(err: sqlx::Error) -> RagError {
    RagError::Store(format!("sqlite: {}", err))
}

fn row_to_project(row: &SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        project_id: row.get("project_id"),
    }
}

fn row_to_asset(row: &SqliteRow) -> Asset {
    let size: i64 = row.get("size");
    Asset {
        id: row.get("id"),
        project_id: row.get("project_id"),
        asset_type: AssetType::File,
        name: row.get("name"),
        size: size.max(0) as u64,
        created_at: row.get("created_at"),
    }
}

fn row_to_chunk(row: &SqliteRow) -> Result<Chunk> {
    let metadata_json: String = row.get("metadata_json");
    let metadata: Metadata = serde_json::from_str(&metadata_json)?;
    Ok(Chunk {
        id: row.get("id"),
        project_id: row.get("project_id"),
        asset_id: row.get("asset_id"),
        order: row.get("chunk_order"),
        text: row.get("text"),
        metadata,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_or_create_project(&self, project_id: &str) -> Result<Project> {
        validate_project_id(project_id)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO projects (project_id, created_at) VALUES (?, ?)
             ON CONFLICT(project_id) DO NOTHING",
        )
        .bind(project_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = sqlx::query("SELECT id, project_id FROM projects WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row_to_project(&row))
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT id, project_id FROM projects WHERE project_id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_project))
    }

    async fn list_projects(&self, page: u32, page_size: u32) -> Result<(Vec<Project>, u32)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let offset = (page.max(1) - 1) as i64 * page_size as i64;

        let rows = sqlx::query("SELECT id, project_id FROM projects ORDER BY id LIMIT ? OFFSET ?")
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok((
            rows.iter().map(row_to_project).collect(),
            total_pages(total.max(0) as u64, page_size),
        ))
    }

    async fn create_asset(&self, asset: &NewAsset) -> Result<Asset> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO assets (project_id, asset_type, name, size, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(project_id, name) DO UPDATE SET
                asset_type = excluded.asset_type,
                size = excluded.size,
                created_at = excluded.created_at
            "#,
        )
        .bind(asset.project_id)
        .bind(asset.asset_type.as_str())
        .bind(&asset.name)
        .bind(asset.size as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_asset(asset.project_id, &asset.name)
            .await?
            .ok_or_else(|| RagError::NotFound(format!("asset '{}'", asset.name)))
    }

    async fn get_asset(&self, project_id: i64, name: &str) -> Result<Option<Asset>> {
        let row = sqlx::query(
            "SELECT id, project_id, name, size, created_at FROM assets
             WHERE project_id = ? AND name = ?",
        )
        .bind(project_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_asset))
    }

    async fn list_assets(&self, project_id: i64) -> Result<Vec<Asset>> {
        let rows = sqlx::query(
            "SELECT id, project_id, name, size, created_at FROM assets
             WHERE project_id = ? ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(row_to_asset).collect())
    }

    async fn insert_chunks(&self, chunks: &[NewChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = chunks.iter().find(|c| c.order < 1) {
            return Err(RagError::Validation(format!(
                "chunk order must be positive, got {}",
                bad.order
            )));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for group in chunks.chunks(INSERT_CHUNK_ROWS) {
            let encoded = group
                .iter()
                .map(|c| serde_json::to_string(&c.metadata))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO chunks (project_id, asset_id, chunk_order, text, metadata_json) ",
            );
            qb.push_values(group.iter().zip(encoded), |mut b, (c, meta)| {
                b.push_bind(c.project_id)
                    .push_bind(c.asset_id)
                    .push_bind(c.order)
                    .push_bind(c.text.clone())
                    .push_bind(meta);
            });
            qb.build().execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        Ok(chunks.len())
    }

    async fn delete_chunks_by_project(&self, project_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_chunks_by_asset(&self, project_id: i64, asset_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE project_id = ? AND asset_id = ?")
            .bind(project_id)
            .bind(asset_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn get_chunk_page(
        &self,
        project_id: i64,
        page_no: u32,
        page_size: u32,
    ) -> Result<Vec<Chunk>> {
        let offset = (page_no.max(1) - 1) as i64 * page_size as i64;
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, asset_id, chunk_order, text, metadata_json
            FROM chunks
            WHERE project_id = ?
            ORDER BY asset_id, chunk_order, id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(project_id)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_chunk).collect()
    }

    async fn count_chunks(&self, project_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count.max(0) as u64)
    }
}
