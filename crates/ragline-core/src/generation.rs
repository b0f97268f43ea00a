//! Generation provider trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{PromptMessage, Role};
use crate::provider::{truncate_input, LlmBackend};

/// Trait for text-generation backends.
///
/// `generate_text` never mutates the history it is given: it builds a
/// request-local message list of `chat_history` followed by a user message
/// made from `prompt`. Each request therefore owns its history and nothing
/// accumulates across unrelated calls.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn backend(&self) -> LlmBackend;

    /// Bind the model used for all subsequent generations.
    fn select_generation_model(&mut self, model_id: &str);

    /// Maximum characters kept from any message content.
    fn input_max_characters(&self) -> usize;

    /// Build a role-tagged message with content truncated to
    /// [`input_max_characters`](GenerationProvider::input_max_characters).
    fn construct_message(&self, content: &str, role: Role) -> PromptMessage {
        PromptMessage {
            role,
            content: truncate_input(content, self.input_max_characters()),
        }
    }

    /// Generate a reply to `prompt` given a prior `chat_history`.
    ///
    /// Fails with `RagError::Configuration` when no model is selected and
    /// `RagError::Provider` when the backend fails or returns no text.
    async fn generate_text(&self, prompt: &str, chat_history: &[PromptMessage]) -> Result<String>;
}

/// Request-local message list: `history` followed by the user `prompt`,
/// every content truncated by the provider.
pub fn request_messages<G: GenerationProvider + ?Sized>(
    provider: &G,
    prompt: &str,
    history: &[PromptMessage],
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend(
        history
            .iter()
            .map(|m| provider.construct_message(&m.content, m.role)),
    );
    messages.push(provider.construct_message(prompt, Role::User));
    messages
}
