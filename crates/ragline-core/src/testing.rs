//! Deterministic stand-ins for providers and stores, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::{EmbedMode, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{request_messages, GenerationProvider};
use crate::models::{CollectionInfo, PromptMessage, RetrievedDocument, VectorRecord};
use crate::provider::{truncate_input, LlmBackend};
use crate::vectordb::memory::InMemoryVectorStore;
use crate::vectordb::VectorStore;

/// Hashes lowercase words into a fixed number of buckets.
pub struct BagOfWordsEmbedder {
    dims: Option<usize>,
    max_chars: usize,
    pub modes: Mutex<Vec<EmbedMode>>,
    pub sent: Mutex<Vec<String>>,
}

impl BagOfWordsEmbedder {
    pub fn unbound() -> Self {
        Self {
            dims: None,
            max_chars: 1000,
            modes: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn new(dims: usize) -> Self {
        let mut e = Self::unbound();
        e.select_embedding_model("bag-of-words", dims);
        e
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn bag_of_words(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = (fnv1a(&word.to_lowercase()) % dims as u64) as usize;
        v[bucket] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Local
    }

    fn select_embedding_model(&mut self, _model_id: &str, embedding_size: usize) {
        self.dims = Some(embedding_size);
    }

    fn embedding_size(&self) -> Option<usize> {
        self.dims
    }

    async fn embed_text(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        let dims = self
            .dims
            .ok_or_else(|| RagError::Configuration("no embedding model".into()))?;
        let text = truncate_input(text, self.max_chars);
        self.modes.lock().unwrap().push(mode);
        self.sent.lock().unwrap().push(text.clone());
        Ok(bag_of_words(&text, dims))
    }
}

/// Returns a canned answer (or fails) and records what it was sent.
pub struct StubGenerator {
    pub reply: Option<String>,
    max_chars: usize,
    pub calls: Mutex<Vec<Vec<PromptMessage>>>,
}

impl StubGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            max_chars: 4000,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            max_chars: 4000,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[async_trait]
impl GenerationProvider for StubGenerator {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Local
    }

    fn select_generation_model(&mut self, _model_id: &str) {}

    fn input_max_characters(&self) -> usize {
        self.max_chars
    }

    async fn generate_text(&self, prompt: &str, chat_history: &[PromptMessage]) -> Result<String> {
        let messages = request_messages(self, prompt, chat_history);
        self.calls.lock().unwrap().push(messages);
        self.reply
            .clone()
            .ok_or_else(|| RagError::Provider("backend unavailable".into()))
    }
}

/// In-memory vector store whose `fail_on`-th `upsert_batch` call (1-based)
/// fails.
pub struct FlakyVectorStore {
    pub inner: InMemoryVectorStore,
    fail_on: usize,
    calls: AtomicUsize,
}

impl FlakyVectorStore {
    pub fn failing_batch(fail_on: usize) -> Self {
        Self {
            inner: InMemoryVectorStore::default(),
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for FlakyVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.inner.collection_exists(name).await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.inner.list_collections().await
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        self.inner.get_collection_info(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        self.inner.delete_collection(name).await
    }

    async fn put_collection(&self, name: &str, embedding_size: usize) -> Result<()> {
        self.inner.put_collection(name, embedding_size).await
    }

    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(RagError::Store(format!("batch {} rejected", call)));
        }
        self.inner.upsert_batch(name, records).await
    }

    async fn search_by_vector(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        self.inner.search_by_vector(name, vector, limit).await
    }
}
