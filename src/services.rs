//! Wiring: build the stores, providers, and orchestrators from [`Config`].
//!
//! [`Services`] is shared by the CLI commands and the HTTP server. Each
//! process owns exactly one [`IndexLocks`], so every indexing entry point
//! in that process serialises per project.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use ragline_core::chunk::Segment;
use ragline_core::docstore::DocumentStore;
use ragline_core::embedding::EmbeddingProvider;
use ragline_core::generation::GenerationProvider;
use ragline_core::index::{IndexLocks, Indexer};
use ragline_core::process::{ProcessRequest, Processor};
use ragline_core::rag::Rag;
use ragline_core::templates::TemplateEngine;
use ragline_core::vectordb::memory::InMemoryVectorStore;
use ragline_core::vectordb::VectorStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::providers::{bind_embedding_provider, bind_generation_provider};
use crate::qdrant::QdrantVectorStore;
use crate::sqlite_store::SqliteDocumentStore;

pub struct Services {
    pub config: Arc<Config>,
    pub docs: Arc<dyn DocumentStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub processor: Processor,
    pub indexer: Indexer,
    pub rag: Rag,
}

/// Build the vector store named by `[vectordb] backend`.
pub fn create_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let distance = config.vectordb.distance()?;
    match config.vectordb.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryVectorStore::new(distance))),
        "qdrant" => {
            let url = config
                .vectordb
                .url
                .as_deref()
                .context("vectordb.url must be specified when backend is 'qdrant'")?;
            let api_key = std::env::var("QDRANT_API_KEY").ok();
            Ok(Arc::new(QdrantVectorStore::new(
                url,
                api_key,
                distance,
                config.llm.timeout_secs,
            )?))
        }
        other => anyhow::bail!("Unknown vectordb.backend: '{}'", other),
    }
}

impl Services {
    /// Connect to the database (migrating it if needed) and construct every
    /// configured backend.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        let docs: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));

        let vectors = create_vector_store(config)?;
        let embedder = bind_embedding_provider(&config.llm)
            .context("Failed to create embedding provider")?;
        let generator = bind_generation_provider(&config.llm)
            .context("Failed to create generation provider")?;

        info!(
            vectordb = %config.vectordb.backend,
            embedding = %config.llm.embedding_backend,
            generation = %config.llm.generation_backend,
            "services ready"
        );

        Ok(Self::assemble(
            config.clone(),
            docs,
            vectors,
            embedder,
            generator,
        ))
    }

    /// Construct the orchestrators over already-built collaborators.
    pub fn assemble(
        config: Config,
        docs: Arc<dyn DocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        let templates = TemplateEngine::new(
            Some(&config.templates.language),
            &config.templates.default_language,
        );
        let indexer = Indexer::new(
            docs.clone(),
            vectors.clone(),
            embedder.clone(),
            Arc::new(IndexLocks::new()),
            config.indexing.settings(),
        );
        let rag = Rag::new(vectors.clone(), embedder, generator, templates);

        Self {
            config: Arc::new(config),
            processor: Processor::new(docs.clone()),
            docs,
            vectors,
            indexer,
            rag,
        }
    }

    /// A processing request using the configured chunking defaults.
    pub fn process_request(
        &self,
        asset_name: String,
        asset_size: u64,
        segments: Vec<Segment>,
        do_reset: bool,
    ) -> ProcessRequest {
        ProcessRequest {
            asset_name,
            asset_size,
            segments,
            chunk_size: self.config.chunking.chunk_size,
            overlap: self.config.chunking.overlap,
            do_reset,
        }
    }
}
