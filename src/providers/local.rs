use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ragline_core::embedding::{EmbedMode, EmbeddingProvider};
use ragline_core::error::{RagError, Result};
use ragline_core::provider::{require_model, truncate_input, LlmBackend, ProviderDefaults};

/// Embedding provider running a fastembed model in-process.
///
/// The model is downloaded from Hugging Face on first use and cached; after
/// that no network calls are made. Inference runs on the blocking pool.
pub struct LocalEmbeddingProvider {
    defaults: ProviderDefaults,
    model_name: Option<String>,
    embedding_size: Option<usize>,
    model: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
}

impl LocalEmbeddingProvider {
    pub fn new(defaults: ProviderDefaults) -> Self {
        Self {
            defaults,
            model_name: None,
            embedding_size: None,
            model: Arc::new(Mutex::new(None)),
        }
    }
}

fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(RagError::Configuration(format!(
            "unknown local embedding model '{}'",
            other
        ))),
    }
}

/// E5 models are trained with `query: ` / `passage: ` prefixes. The prefix
/// counts toward `max_chars`.
fn model_input(model: &str, text: &str, mode: EmbedMode, max_chars: usize) -> String {
    if !model.starts_with("multilingual-e5") {
        return truncate_input(text, max_chars);
    }
    let prefix = match mode {
        EmbedMode::Document => "passage: ",
        EmbedMode::Query => "query: ",
    };
    let budget = max_chars.saturating_sub(prefix.chars().count());
    format!("{}{}", prefix, truncate_input(text, budget))
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn backend(&self) -> LlmBackend {
        LlmBackend::Local
    }

    fn select_embedding_model(&mut self, model_id: &str, embedding_size: usize) {
        self.model_name = Some(model_id.to_string());
        self.embedding_size = Some(embedding_size);
        self.model = Arc::new(Mutex::new(None));
    }

    fn embedding_size(&self) -> Option<usize> {
        self.embedding_size
    }

    async fn embed_text(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        let name = require_model(&self.model_name, "embedding", LlmBackend::Local)?.to_string();
        let kind = fastembed_model(&name)?;
        let input = model_input(&name, text, mode, self.defaults.input_max_characters);
        let slot = self.model.clone();

        let embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut guard = slot
                .lock()
                .map_err(|_| RagError::Provider("local model lock poisoned".to_string()))?;
            if guard.is_none() {
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(kind).with_show_download_progress(true),
                )
                .map_err(|e| {
                    RagError::Provider(format!("failed to initialize local model: {}", e))
                })?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| RagError::Provider("local model unavailable".to_string()))?;
            model
                .embed(vec![input], None)
                .map_err(|e| RagError::Provider(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| RagError::Provider(format!("embedding task failed: {}", e)))??;

        match embeddings.into_iter().next() {
            Some(vector) if !vector.is_empty() => Ok(vector),
            _ => Err(RagError::Provider("local model returned no embedding".to_string())),
        }
    }
}
