//! Embedding and generation backends.
//!
//! Concrete implementations of the core [`EmbeddingProvider`] and
//! [`GenerationProvider`] traits:
//! - **[`OpenAiProvider`]**: `POST /embeddings` and `POST /chat/completions`.
//! - **[`CohereProvider`]**: the v2 `embed` and `chat` endpoints; the only
//!   backend with asymmetric document/query encodings.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed` and
//!   `/api/chat`.
//! - **`LocalEmbeddingProvider`**: fastembed inference behind the
//!   `local-embeddings` feature; embeddings only.
//!
//! # Provider Selection
//!
//! [`create_embedding_provider`] and [`create_generation_provider`] map a
//! backend identifier to an *unbound* provider. A model must be selected
//! before the provider is used; [`bind_embedding_provider`] and
//! [`bind_generation_provider`] do both steps from the `[llm]` config.
//!
//! # Retry Strategy
//!
//! Every HTTP backend goes through [`JsonClient`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod cohere;
#[cfg(feature = "local-embeddings")]
mod local;
mod ollama;
mod openai;

pub use cohere::CohereProvider;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbeddingProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use ragline_core::embedding::EmbeddingProvider;
use ragline_core::error::{RagError, Result};
use ragline_core::generation::GenerationProvider;
use ragline_core::provider::LlmBackend;

use crate::config::LlmConfig;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COHERE_URL: &str = "https://api.cohere.com";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Transport settings shared by the HTTP backends.
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl From<&LlmConfig> for HttpOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }
}

/// JSON-over-HTTP client with retry and exponential backoff.
#[derive(Clone)]
pub(crate) struct JsonClient {
    client: reqwest::Client,
    max_retries: u32,
    label: &'static str,
}

impl JsonClient {
    pub(crate) fn new(label: &'static str, options: &HttpOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("{} http client: {}", label, e)))?;
        Ok(Self {
            client,
            max_retries: options.max_retries,
            label,
        })
    }

    /// POST `body` to `url`, returning the decoded JSON response.
    pub(crate) async fn post(&self, url: &str, bearer: Option<&str>, body: &Value) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(key) = bearer {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            RagError::Provider(format!("{} returned invalid JSON: {}", self.label, e))
                        });
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(backend = self.label, %status, attempt, "retryable API error");
                        last_err = Some(RagError::Provider(format!(
                            "{} API error {}: {}",
                            self.label, status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(RagError::Provider(format!(
                        "{} API error {}: {}",
                        self.label, status, body_text
                    )));
                }
                Err(e) => {
                    warn!(backend = self.label, attempt, error = %e, "request failed");
                    last_err = Some(RagError::Provider(format!(
                        "{} connection error ({}): {}",
                        self.label, url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            RagError::Provider(format!("{} request failed after retries", self.label))
        }))
    }
}

/// Read a JSON array of numbers as an embedding vector.
pub(crate) fn parse_vector(value: Option<&Value>, label: &str) -> Result<Vec<f32>> {
    let items = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| RagError::Provider(format!("invalid {} response: missing embedding", label)))?;

    let vector = items
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                RagError::Provider(format!("invalid {} response: non-numeric embedding", label))
            })
        })
        .collect::<Result<Vec<f32>>>()?;

    if vector.is_empty() {
        return Err(RagError::Provider(format!("{} returned an empty embedding", label)));
    }
    Ok(vector)
}

/// Reject missing or blank generated text.
pub(crate) fn non_empty_text(value: Option<&Value>, label: &str) -> Result<String> {
    match value.and_then(|v| v.as_str()) {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(RagError::Provider(format!("{} returned no generated text", label))),
    }
}

fn api_key(var: &str, backend: LlmBackend) -> Result<String> {
    std::env::var(var).map_err(|_| {
        RagError::Configuration(format!(
            "{} environment variable not set (required by the {} backend)",
            var, backend
        ))
    })
}

/// Create an unbound embedding provider for `backend`.
///
/// # Errors
///
/// `UnknownProvider` for an unrecognised identifier; `Configuration` when the
/// backend's API key is missing or local embeddings were not compiled in.
pub fn create_embedding_provider(
    backend: &str,
    config: &LlmConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    let backend: LlmBackend = backend.parse()?;
    let http = HttpOptions::from(config);
    let defaults = config.defaults();

    match backend {
        LlmBackend::OpenAi => Ok(Box::new(OpenAiProvider::new(
            config.openai_url.as_deref().unwrap_or(DEFAULT_OPENAI_URL),
            api_key("OPENAI_API_KEY", backend)?,
            defaults,
            &http,
        )?)),
        LlmBackend::Cohere => Ok(Box::new(CohereProvider::new(
            config.cohere_url.as_deref().unwrap_or(DEFAULT_COHERE_URL),
            api_key("COHERE_API_KEY", backend)?,
            defaults,
            &http,
        )?)),
        LlmBackend::Ollama => Ok(Box::new(OllamaProvider::new(
            config.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            defaults,
            &http,
        )?)),
        #[cfg(feature = "local-embeddings")]
        LlmBackend::Local => Ok(Box::new(LocalEmbeddingProvider::new(defaults))),
        #[cfg(not(feature = "local-embeddings"))]
        LlmBackend::Local => Err(RagError::Configuration(
            "local embedding backend requires --features local-embeddings".to_string(),
        )),
    }
}

/// Create an unbound generation provider for `backend`.
pub fn create_generation_provider(
    backend: &str,
    config: &LlmConfig,
) -> Result<Box<dyn GenerationProvider>> {
    let backend: LlmBackend = backend.parse()?;
    let http = HttpOptions::from(config);
    let defaults = config.defaults();

    match backend {
        LlmBackend::OpenAi => Ok(Box::new(OpenAiProvider::new(
            config.openai_url.as_deref().unwrap_or(DEFAULT_OPENAI_URL),
            api_key("OPENAI_API_KEY", backend)?,
            defaults,
            &http,
        )?)),
        LlmBackend::Cohere => Ok(Box::new(CohereProvider::new(
            config.cohere_url.as_deref().unwrap_or(DEFAULT_COHERE_URL),
            api_key("COHERE_API_KEY", backend)?,
            defaults,
            &http,
        )?)),
        LlmBackend::Ollama => Ok(Box::new(OllamaProvider::new(
            config.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            defaults,
            &http,
        )?)),
        LlmBackend::Local => Err(RagError::Configuration(
            "the local backend provides embeddings only".to_string(),
        )),
    }
}

/// Default vector size of a known local model.
pub fn local_model_dims(model: &str) -> Option<usize> {
    match model {
        "all-minilm-l6-v2" | "bge-small-en-v1.5" | "multilingual-e5-small" => Some(384),
        "bge-base-en-v1.5" | "multilingual-e5-base" => Some(768),
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => Some(768),
        "bge-large-en-v1.5" | "multilingual-e5-large" => Some(1024),
        _ => None,
    }
}

/// Create the configured embedding provider and select its model.
///
/// Without `llm.embedding_model` the provider is returned unbound and every
/// embedding call fails with a configuration error.
pub fn bind_embedding_provider(config: &LlmConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let mut provider = create_embedding_provider(&config.embedding_backend, config)?;

    if let Some(model) = &config.embedding_model {
        let size = config
            .embedding_size
            .or_else(|| local_model_dims(model))
            .ok_or_else(|| {
                RagError::Configuration(format!(
                    "llm.embedding_size is required for embedding model '{}'",
                    model
                ))
            })?;
        provider.select_embedding_model(model, size);
        info!(backend = %provider.backend(), model = %model, size, "embedding model selected");
    }

    Ok(Arc::from(provider))
}

/// Create the configured generation provider and select its model.
pub fn bind_generation_provider(config: &LlmConfig) -> Result<Arc<dyn GenerationProvider>> {
    let mut provider = create_generation_provider(&config.generation_backend, config)?;

    if let Some(model) = &config.generation_model {
        provider.select_generation_model(model);
        info!(backend = %provider.backend(), model = %model, "generation model selected");
    }

    Ok(Arc::from(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn llm() -> LlmConfig {
        Config::minimal("unused.sqlite".into()).llm
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        assert!(matches!(
            create_embedding_provider("gpt-neo", &llm()),
            Err(RagError::UnknownProvider(_))
        ));
        assert!(matches!(
            create_generation_provider("gpt-neo", &llm()),
            Err(RagError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_factory_returns_requested_backend() {
        let provider = create_embedding_provider("OLLAMA", &llm()).unwrap();
        assert_eq!(provider.backend(), LlmBackend::Ollama);
        assert_eq!(provider.embedding_size(), None);
    }

    #[test]
    fn test_local_generation_is_rejected() {
        assert!(matches!(
            create_generation_provider("local", &llm()),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_bind_requires_size_for_unknown_models() {
        let mut config = llm();
        config.embedding_model = Some("nomic-embed-text".into());
        assert!(matches!(
            bind_embedding_provider(&config),
            Err(RagError::Configuration(_))
        ));

        config.embedding_size = Some(768);
        let provider = bind_embedding_provider(&config).unwrap();
        assert_eq!(provider.embedding_size(), Some(768));
    }

    #[test]
    fn test_parse_vector_rejects_empty() {
        let json = serde_json::json!([]);
        assert!(parse_vector(Some(&json), "test").is_err());
        let json = serde_json::json!([0.5, -1.0]);
        assert_eq!(parse_vector(Some(&json), "test").unwrap(), vec![0.5, -1.0]);
    }
}
