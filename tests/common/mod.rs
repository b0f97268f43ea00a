#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use ragline::config::Config;
use ragline::services::Services;
use ragline::sqlite_store::SqliteDocumentStore;
use ragline::{db, migrate};
use ragline_core::embedding::{EmbedMode, EmbeddingProvider};
use ragline_core::error::{RagError, Result};
use ragline_core::generation::{request_messages, GenerationProvider};
use ragline_core::models::PromptMessage;
use ragline_core::provider::LlmBackend;
use ragline_core::vectordb::memory::InMemoryVectorStore;

/// Deterministic embedder: lowercase words hashed into `dims` buckets.
pub struct WordHashEmbedder {
    dims: usize,
    pub modes: Mutex<Vec<EmbedMode>>,
}

impl WordHashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            modes: Mutex::new(Vec::new()),
        }
    }
}

pub fn word_vector(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in word.to_lowercase().bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        v[(hash % dims as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Local
    }

    fn select_embedding_model(&mut self, _model_id: &str, embedding_size: usize) {
        self.dims = embedding_size;
    }

    fn embedding_size(&self) -> Option<usize> {
        Some(self.dims)
    }

    async fn embed_text(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        self.modes.lock().unwrap().push(mode);
        Ok(word_vector(text, self.dims))
    }
}

/// Canned generator that records every message list it receives.
pub struct RecordingGenerator {
    reply: Option<String>,
    pub calls: Mutex<Vec<Vec<PromptMessage>>>,
}

impl RecordingGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Ollama
    }

    fn select_generation_model(&mut self, _model_id: &str) {}

    fn input_max_characters(&self) -> usize {
        4000
    }

    async fn generate_text(&self, prompt: &str, chat_history: &[PromptMessage]) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(request_messages(self, prompt, chat_history));
        self.reply
            .clone()
            .ok_or_else(|| RagError::Provider("generation backend unavailable".into()))
    }
}

pub fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::minimal(tmp.path().join("ragline.sqlite"));
    config.indexing.page_size = 10;
    config.chunking.chunk_size = 40;
    config.chunking.overlap = 10;
    config
}

pub async fn sqlite_store(config: &Config) -> Arc<SqliteDocumentStore> {
    let pool = db::connect(config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    Arc::new(SqliteDocumentStore::new(pool))
}

/// Services over SQLite, in-memory vectors, and the stub providers.
pub async fn stub_services(
    tmp: &TempDir,
    generator: RecordingGenerator,
) -> (Services, Arc<WordHashEmbedder>, Arc<RecordingGenerator>) {
    let config = test_config(tmp);
    let docs = sqlite_store(&config).await;
    let embedder = Arc::new(WordHashEmbedder::new(256));
    let generator = Arc::new(generator);
    let services = Services::assemble(
        config,
        docs,
        Arc::new(InMemoryVectorStore::default()),
        embedder.clone(),
        generator.clone(),
    );
    (services, embedder, generator)
}
