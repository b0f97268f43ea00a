use async_trait::async_trait;
use serde_json::json;

use ragline_core::embedding::{EmbedMode, EmbeddingProvider};
use ragline_core::error::Result;
use ragline_core::generation::{request_messages, GenerationProvider};
use ragline_core::models::PromptMessage;
use ragline_core::provider::{require_model, truncate_input, LlmBackend, ProviderDefaults};

use super::{non_empty_text, parse_vector, HttpOptions, JsonClient};

/// Cohere v2 backend (`/v2/embed`, `/v2/chat`).
///
/// Cohere's embed models encode documents and queries differently; the
/// [`EmbedMode`] selects the `input_type` sent with each request.
pub struct CohereProvider {
    http: JsonClient,
    base_url: String,
    api_key: String,
    defaults: ProviderDefaults,
    embedding_model: Option<String>,
    embedding_size: Option<usize>,
    generation_model: Option<String>,
}

impl CohereProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        defaults: ProviderDefaults,
        http: &HttpOptions,
    ) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new("Cohere", http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            defaults,
            embedding_model: None,
            embedding_size: None,
            generation_model: None,
        })
    }
}

/// Cohere `input_type` for an embedding mode.
pub fn input_type(mode: EmbedMode) -> &'static str {
    match mode {
        EmbedMode::Document => "search_document",
        EmbedMode::Query => "search_query",
    }
}

#[async_trait]
impl EmbeddingProvider for CohereProvider {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Cohere
    }

    fn select_embedding_model(&mut self, model_id: &str, embedding_size: usize) {
        self.embedding_model = Some(model_id.to_string());
        self.embedding_size = Some(embedding_size);
    }

    fn embedding_size(&self) -> Option<usize> {
        self.embedding_size
    }

    async fn embed_text(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        let model = require_model(&self.embedding_model, "embedding", LlmBackend::Cohere)?;
        let body = json!({
            "model": model,
            "texts": [truncate_input(text, self.defaults.input_max_characters)],
            "input_type": input_type(mode),
            "embedding_types": ["float"],
        });

        let response = self
            .http
            .post(&format!("{}/v2/embed", self.base_url), Some(&self.api_key), &body)
            .await?;

        parse_vector(response.pointer("/embeddings/float/0"), "Cohere")
    }
}

#[async_trait]
impl GenerationProvider for CohereProvider {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Cohere
    }

    fn select_generation_model(&mut self, model_id: &str) {
        self.generation_model = Some(model_id.to_string());
    }

    fn input_max_characters(&self) -> usize {
        self.defaults.input_max_characters
    }

    async fn generate_text(&self, prompt: &str, chat_history: &[PromptMessage]) -> Result<String> {
        let model = require_model(&self.generation_model, "generation", LlmBackend::Cohere)?;
        let body = json!({
            "model": model,
            "messages": request_messages(self, prompt, chat_history),
            "max_tokens": self.defaults.generation_max_tokens,
            "temperature": self.defaults.generation_temperature,
        });

        let response = self
            .http
            .post(&format!("{}/v2/chat", self.base_url), Some(&self.api_key), &body)
            .await?;

        non_empty_text(response.pointer("/message/content/0/text"), "Cohere")
    }
}
