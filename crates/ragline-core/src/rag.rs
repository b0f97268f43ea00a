//! Retrieval and grounded answer generation.
//!
//! [`Rag::search`] embeds a query in [`EmbedMode::Query`] and runs a
//! similarity search over the project's collection. [`Rag::answer`] builds
//! a grounded prompt from the hits and hands it to the generation provider:
//!
//! ```text
//! chat_history = [system: rag.system_prompt]
//! full_prompt  = join("\n", rag.document_prompt(rank, text) for each hit)
//!                + "\n\n" + rag.query_prompt(query)
//!                + "\n\n" + rag.footer_prompt
//! ```
//!
//! Search never takes the project's index lock, so it may observe an index
//! that is still being built.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::embedding::{EmbedMode, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::models::{collection_name, validate_project_id, PromptMessage, RetrievedDocument, Role};
use crate::templates::TemplateEngine;
use crate::vectordb::VectorStore;

/// A generated answer with the prompt that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub full_prompt: String,
    pub chat_history: Vec<PromptMessage>,
}

/// Outcome of [`Rag::answer`].
#[derive(Debug)]
pub enum AnswerOutcome {
    /// The search returned no documents; nothing was sent to the generator.
    NoMatches,
    /// Documents were found but generation failed.
    GenerationFailed {
        cause: RagError,
        full_prompt: String,
        chat_history: Vec<PromptMessage>,
    },
    Answer(RagAnswer),
}

pub struct Rag {
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    templates: TemplateEngine,
}

impl Rag {
    pub fn new(
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        templates: TemplateEngine,
    ) -> Self {
        Self {
            vectors,
            embedder,
            generator,
            templates,
        }
    }

    /// The same orchestrator with another template language selected.
    pub fn with_language(&self, language: Option<&str>) -> Self {
        Self {
            vectors: self.vectors.clone(),
            embedder: self.embedder.clone(),
            generator: self.generator.clone(),
            templates: self.templates.with_language(language),
        }
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Up to `limit` documents most similar to `text`, best first.
    ///
    /// A project that has never been indexed yields an empty list.
    pub async fn search(
        &self,
        project_id: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        validate_project_id(project_id)?;
        if text.trim().is_empty() {
            return Err(RagError::Validation("query text must not be empty".to_string()));
        }
        if limit == 0 {
            return Err(RagError::Validation("limit must be positive".to_string()));
        }

        let vector = self.embedder.embed_text(text, EmbedMode::Query).await?;
        if vector.is_empty() {
            return Err(RagError::Provider("empty query embedding".to_string()));
        }

        let collection = collection_name(project_id);
        match self.vectors.search_by_vector(&collection, &vector, limit).await {
            Ok(hits) => {
                debug!(collection = %collection, hits = hits.len(), "search complete");
                Ok(hits)
            }
            Err(RagError::NotFound(_)) => {
                debug!(collection = %collection, "search on missing collection");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Answer `query` from the project's top `limit` documents.
    ///
    /// Retrieval and prompt-building errors are returned as `Err`; a
    /// generation failure is reported as [`AnswerOutcome::GenerationFailed`]
    /// together with the prompt that was sent.
    pub async fn answer(&self, project_id: &str, query: &str, limit: usize) -> Result<AnswerOutcome> {
        let documents = self.search(project_id, query, limit).await?;
        if documents.is_empty() {
            return Ok(AnswerOutcome::NoMatches);
        }

        let (full_prompt, chat_history) = self.build_prompt(query, &documents)?;

        match self.generator.generate_text(&full_prompt, &chat_history).await {
            Ok(answer) => Ok(AnswerOutcome::Answer(RagAnswer {
                answer,
                full_prompt,
                chat_history,
            })),
            Err(cause) => {
                warn!(project = project_id, error = %cause, "answer generation failed");
                Ok(AnswerOutcome::GenerationFailed {
                    cause,
                    full_prompt,
                    chat_history,
                })
            }
        }
    }

    /// Render the grounded prompt and the seeded chat history.
    pub fn build_prompt(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
    ) -> Result<(String, Vec<PromptMessage>)> {
        let system_prompt = self.templates.get("rag", "system_prompt", &[])?;

        let document_block = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let rank = (i + 1).to_string();
                self.templates.get(
                    "rag",
                    "document_prompt",
                    &[("doc_num", rank.as_str()), ("chunk_text", doc.text.as_str())],
                )
            })
            .collect::<Result<Vec<_>>>()?
            .join("\n");

        let query_prompt = self.templates.get("rag", "query_prompt", &[("query", query)])?;
        let footer_prompt = self.templates.get("rag", "footer_prompt", &[])?;

        let chat_history = vec![self
            .generator
            .construct_message(&system_prompt, Role::System)];
        let full_prompt = [document_block, query_prompt, footer_prompt].join("\n\n");

        Ok((full_prompt, chat_history))
    }
}
