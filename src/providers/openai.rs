use async_trait::async_trait;
use serde_json::json;

use ragline_core::embedding::{EmbedMode, EmbeddingProvider};
use ragline_core::error::Result;
use ragline_core::generation::{request_messages, GenerationProvider};
use ragline_core::models::PromptMessage;
use ragline_core::provider::{require_model, truncate_input, LlmBackend, ProviderDefaults};

use super::{non_empty_text, parse_vector, HttpOptions, JsonClient};

/// OpenAI-compatible backend (`/embeddings`, `/chat/completions`).
///
/// `base_url` includes the API version, e.g. `https://api.openai.com/v1`.
/// OpenAI embeddings are symmetric, so [`EmbedMode`] is ignored.
pub struct OpenAiProvider {
    http: JsonClient,
    base_url: String,
    api_key: String,
    defaults: ProviderDefaults,
    embedding_model: Option<String>,
    embedding_size: Option<usize>,
    generation_model: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        defaults: ProviderDefaults,
        http: &HttpOptions,
    ) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new("OpenAI", http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            defaults,
            embedding_model: None,
            embedding_size: None,
            generation_model: None,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn backend(&self) -> LlmBackend {
        LlmBackend::OpenAi
    }

    fn select_embedding_model(&mut self, model_id: &str, embedding_size: usize) {
        self.embedding_model = Some(model_id.to_string());
        self.embedding_size = Some(embedding_size);
    }

    fn embedding_size(&self) -> Option<usize> {
        self.embedding_size
    }

    async fn embed_text(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        let model = require_model(&self.embedding_model, "embedding", LlmBackend::OpenAi)?;
        let body = json!({
            "model": model,
            "input": truncate_input(text, self.defaults.input_max_characters),
        });

        let response = self
            .http
            .post(&format!("{}/embeddings", self.base_url), Some(&self.api_key), &body)
            .await?;

        parse_vector(response.pointer("/data/0/embedding"), "OpenAI")
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn backend(&self) -> LlmBackend {
        LlmBackend::OpenAi
    }

    fn select_generation_model(&mut self, model_id: &str) {
        self.generation_model = Some(model_id.to_string());
    }

    fn input_max_characters(&self) -> usize {
        self.defaults.input_max_characters
    }

    async fn generate_text(&self, prompt: &str, chat_history: &[PromptMessage]) -> Result<String> {
        let model = require_model(&self.generation_model, "generation", LlmBackend::OpenAi)?;
        let body = json!({
            "model": model,
            "messages": request_messages(self, prompt, chat_history),
            "max_tokens": self.defaults.generation_max_tokens,
            "temperature": self.defaults.generation_temperature,
        });

        let response = self
            .http
            .post(
                &format!("{}/chat/completions", self.base_url),
                Some(&self.api_key),
                &body,
            )
            .await?;

        non_empty_text(response.pointer("/choices/0/message/content"), "OpenAI")
    }
}
