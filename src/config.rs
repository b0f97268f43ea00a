//! TOML configuration.
//!
//! Loaded once at startup by [`load_config`], which parses and validates
//! every section. API keys are never read from the file; providers take
//! them from `OPENAI_API_KEY`, `COHERE_API_KEY` and `QDRANT_API_KEY`.
//!
//! ```toml
//! [db]
//! path = "./data/ragline.sqlite"
//!
//! [llm]
//! generation_backend = "openai"
//! embedding_backend = "cohere"
//! generation_model = "gpt-4o-mini"
//! embedding_model = "embed-multilingual-light-v3.0"
//! embedding_size = 384
//!
//! [vectordb]
//! backend = "qdrant"
//! url = "http://localhost:6334"
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ragline_core::index::IndexSettings;
use ragline_core::models::Distance;
use ragline_core::provider::{LlmBackend, ProviderDefaults};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub vectordb: VectorDbConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    100
}
fn default_overlap() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            insert_batch_size: default_insert_batch_size(),
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

impl IndexingConfig {
    pub fn settings(&self) -> IndexSettings {
        IndexSettings {
            page_size: self.page_size,
            insert_batch_size: self.insert_batch_size,
            embed_concurrency: self.embed_concurrency,
        }
    }
}

fn default_page_size() -> u32 {
    50
}
fn default_insert_batch_size() -> usize {
    50
}
fn default_embed_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub generation_backend: String,
    pub embedding_backend: String,
    #[serde(default)]
    pub generation_model: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub embedding_size: Option<usize>,
    #[serde(default = "default_input_max_characters")]
    pub input_max_characters: usize,
    #[serde(default = "default_generation_max_tokens")]
    pub generation_max_tokens: u32,
    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,
    #[serde(default)]
    pub openai_url: Option<String>,
    #[serde(default)]
    pub cohere_url: Option<String>,
    #[serde(default)]
    pub ollama_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults {
            input_max_characters: self.input_max_characters,
            generation_max_tokens: self.generation_max_tokens,
            generation_temperature: self.generation_temperature,
        }
    }

    pub fn generation_backend(&self) -> Result<LlmBackend> {
        Ok(self.generation_backend.parse::<LlmBackend>()?)
    }

    pub fn embedding_backend(&self) -> Result<LlmBackend> {
        Ok(self.embedding_backend.parse::<LlmBackend>()?)
    }
}

fn default_input_max_characters() -> usize {
    1000
}
fn default_generation_max_tokens() -> u32 {
    1000
}
fn default_generation_temperature() -> f32 {
    0.1
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorDbConfig {
    #[serde(default = "default_vectordb_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_distance")]
    pub distance: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: default_vectordb_backend(),
            url: None,
            distance: default_distance(),
        }
    }
}

impl VectorDbConfig {
    pub fn distance(&self) -> Result<Distance> {
        Ok(self.distance.parse::<Distance>()?)
    }
}

fn default_vectordb_backend() -> String {
    "memory".to_string()
}
fn default_distance() -> String {
    "cosine".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemplatesConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            default_language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// A config that needs no file: in-memory vectors, Ollama backends,
    /// and the given database path.
    pub fn minimal(db_path: PathBuf) -> Self {
        Self {
            db: DbConfig { path: db_path },
            chunking: ChunkingConfig::default(),
            indexing: IndexingConfig::default(),
            llm: LlmConfig {
                generation_backend: "ollama".to_string(),
                embedding_backend: "ollama".to_string(),
                generation_model: None,
                embedding_model: None,
                embedding_size: None,
                input_max_characters: default_input_max_characters(),
                generation_max_tokens: default_generation_max_tokens(),
                generation_temperature: default_generation_temperature(),
                openai_url: None,
                cohere_url: None,
                ollama_url: None,
                timeout_secs: default_timeout_secs(),
                max_retries: default_max_retries(),
            },
            vectordb: VectorDbConfig::default(),
            templates: TemplatesConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    // Validate indexing
    if config.indexing.page_size == 0 {
        anyhow::bail!("indexing.page_size must be > 0");
    }
    if config.indexing.insert_batch_size == 0 {
        anyhow::bail!("indexing.insert_batch_size must be > 0");
    }
    if config.indexing.embed_concurrency == 0 {
        anyhow::bail!("indexing.embed_concurrency must be >= 1");
    }

    // Validate llm
    config.llm.generation_backend().with_context(|| {
        format!(
            "Unknown llm.generation_backend: '{}'. Must be openai, cohere, ollama, or local.",
            config.llm.generation_backend
        )
    })?;
    config.llm.embedding_backend().with_context(|| {
        format!(
            "Unknown llm.embedding_backend: '{}'. Must be openai, cohere, ollama, or local.",
            config.llm.embedding_backend
        )
    })?;
    if config.llm.embedding_size == Some(0) {
        anyhow::bail!("llm.embedding_size must be > 0");
    }
    if config.llm.input_max_characters == 0 {
        anyhow::bail!("llm.input_max_characters must be > 0");
    }

    // Validate vectordb
    match config.vectordb.backend.as_str() {
        "memory" => {}
        "qdrant" => {
            if config.vectordb.url.is_none() {
                anyhow::bail!("vectordb.url must be specified when backend is 'qdrant'");
            }
        }
        other => anyhow::bail!(
            "Unknown vectordb.backend: '{}'. Must be qdrant or memory.",
            other
        ),
    }
    config.vectordb.distance()?;

    Ok(())
}
