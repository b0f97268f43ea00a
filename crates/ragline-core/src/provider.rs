//! Backend identifiers and settings shared by embedding and generation
//! providers.
//!
//! Concrete providers (OpenAI, Cohere, Ollama, local fastembed) live in the
//! `ragline` app crate and are constructed by its factory from a
//! [`LlmBackend`] plus [`ProviderDefaults`].

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Known language-model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    OpenAi,
    Cohere,
    Ollama,
    Local,
}

impl LlmBackend {
    pub const ALL: [LlmBackend; 4] = [
        LlmBackend::OpenAi,
        LlmBackend::Cohere,
        LlmBackend::Ollama,
        LlmBackend::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "openai",
            LlmBackend::Cohere => "cohere",
            LlmBackend::Ollama => "ollama",
            LlmBackend::Local => "local",
        }
    }
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = RagError;

    /// Case-insensitive; `"hugging_face"` is accepted as an alias of `local`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmBackend::OpenAi),
            "cohere" => Ok(LlmBackend::Cohere),
            "ollama" => Ok(LlmBackend::Ollama),
            "local" | "hugging_face" | "huggingface" => Ok(LlmBackend::Local),
            other => Err(RagError::UnknownProvider(other.to_string())),
        }
    }
}

/// Defaults bound into every provider at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderDefaults {
    /// Inputs longer than this (in characters) are truncated before sending.
    pub input_max_characters: usize,
    pub generation_max_tokens: u32,
    pub generation_temperature: f32,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            input_max_characters: 1000,
            generation_max_tokens: 1000,
            generation_temperature: 0.1,
        }
    }
}

/// Truncate to at most `max_chars` characters, then trim surrounding
/// whitespace. Lossy by policy: overlong input is never an error.
pub fn truncate_input(text: &str, max_chars: usize) -> String {
    let cut = match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };
    cut.trim().to_string()
}

/// Fail with [`RagError::Configuration`] when no model has been selected.
pub fn require_model<'a>(model: &'a Option<String>, what: &str, backend: LlmBackend) -> Result<&'a str> {
    model.as_deref().ok_or_else(|| {
        RagError::Configuration(format!(
            "{} model for {} was not selected",
            what, backend
        ))
    })
}
