use async_trait::async_trait;
use serde_json::json;

use ragline_core::embedding::{EmbedMode, EmbeddingProvider};
use ragline_core::error::Result;
use ragline_core::generation::{request_messages, GenerationProvider};
use ragline_core::models::PromptMessage;
use ragline_core::provider::{require_model, truncate_input, LlmBackend, ProviderDefaults};

use super::{non_empty_text, parse_vector, HttpOptions, JsonClient};

/// Backend for a local Ollama instance (`/api/embed`, `/api/chat`).
///
/// Requires Ollama to be running with the selected models pulled
/// (e.g. `ollama pull nomic-embed-text`). No API key.
pub struct OllamaProvider {
    http: JsonClient,
    base_url: String,
    defaults: ProviderDefaults,
    embedding_model: Option<String>,
    embedding_size: Option<usize>,
    generation_model: Option<String>,
}

impl OllamaProvider {
    pub fn new(base_url: &str, defaults: ProviderDefaults, http: &HttpOptions) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new("Ollama", http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            defaults,
            embedding_model: None,
            embedding_size: None,
            generation_model: None,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Ollama
    }

    fn select_embedding_model(&mut self, model_id: &str, embedding_size: usize) {
        self.embedding_model = Some(model_id.to_string());
        self.embedding_size = Some(embedding_size);
    }

    fn embedding_size(&self) -> Option<usize> {
        self.embedding_size
    }

    async fn embed_text(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        let model = require_model(&self.embedding_model, "embedding", LlmBackend::Ollama)?;
        let body = json!({
            "model": model,
            "input": truncate_input(text, self.defaults.input_max_characters),
        });

        let response = self
            .http
            .post(&format!("{}/api/embed", self.base_url), None, &body)
            .await?;

        parse_vector(response.pointer("/embeddings/0"), "Ollama")
    }
}

#[async_trait]
impl GenerationProvider for OllamaProvider {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Ollama
    }

    fn select_generation_model(&mut self, model_id: &str) {
        self.generation_model = Some(model_id.to_string());
    }

    fn input_max_characters(&self) -> usize {
        self.defaults.input_max_characters
    }

    async fn generate_text(&self, prompt: &str, chat_history: &[PromptMessage]) -> Result<String> {
        let model = require_model(&self.generation_model, "generation", LlmBackend::Ollama)?;
        let body = json!({
            "model": model,
            "messages": request_messages(self, prompt, chat_history),
            "stream": false,
            "options": {
                "temperature": self.defaults.generation_temperature,
                "num_predict": self.defaults.generation_max_tokens,
            },
        });

        let response = self
            .http
            .post(&format!("{}/api/chat", self.base_url), None, &body)
            .await?;

        non_empty_text(response.pointer("/message/content"), "Ollama")
    }
}
