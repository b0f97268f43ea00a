//! CLI command implementations.
//!
//! Each `run_*` function loads what it needs from [`Config`], performs one
//! operation, and prints a human-readable summary to stdout. Commands that
//! only touch the document store (`process`, `projects`) never construct
//! providers, so they work without API keys.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use ragline_core::docstore::DocumentStore;
use ragline_core::error::RagError;
use ragline_core::process::{ProcessRequest, Processor};
use ragline_core::rag::AnswerOutcome;

use crate::config::Config;
use crate::db;
use crate::loader::load_file;
use crate::migrate;
use crate::services::Services;
use crate::sqlite_store::SqliteDocumentStore;

async fn open_document_store(config: &Config) -> Result<Arc<SqliteDocumentStore>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(Arc::new(SqliteDocumentStore::new(pool)))
}

/// Options for `ragline process`.
pub struct ProcessOptions<'a> {
    pub project_id: &'a str,
    pub file: &'a Path,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub do_reset: bool,
}

pub async fn run_process(config: &Config, opts: ProcessOptions<'_>) -> Result<()> {
    let asset = load_file(opts.file)
        .with_context(|| format!("Failed to load {}", opts.file.display()))?;
    let docs = open_document_store(config).await?;

    let req = ProcessRequest {
        asset_name: asset.name.clone(),
        asset_size: asset.size,
        segments: asset.segments,
        chunk_size: opts.chunk_size.unwrap_or(config.chunking.chunk_size),
        overlap: opts.overlap.unwrap_or(config.chunking.overlap),
        do_reset: opts.do_reset,
    };
    let report = Processor::new(docs).process(opts.project_id, &req).await?;

    println!(
        "Processed {} into project '{}': {} chunks stored",
        asset.name, opts.project_id, report.inserted_chunks
    );
    Ok(())
}

pub async fn run_index_push(config: &Config, project_id: &str, do_reset: bool) -> Result<()> {
    let services = Services::from_config(config).await?;
    match services.indexer.push_index(project_id, do_reset).await {
        Ok(inserted) => {
            println!("Indexed {} records into project '{}'", inserted, project_id);
            Ok(())
        }
        Err(RagError::PartialFailure { inserted, cause }) => {
            println!(
                "Indexing stopped after {} records in project '{}'",
                inserted, project_id
            );
            Err(anyhow::anyhow!(*cause).context("indexing failed part-way"))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn run_index_info(config: &Config, project_id: &str) -> Result<()> {
    let services = Services::from_config(config).await?;
    let info = services.indexer.get_index_info(project_id).await?;

    println!("Collection:   {}", info.name);
    println!("Vector size:  {}", info.vector_size);
    println!("Distance:     {}", info.distance.as_str());
    println!("Points:       {}", info.points_count);
    Ok(())
}

pub async fn run_index_reset(config: &Config, project_id: &str) -> Result<()> {
    let services = Services::from_config(config).await?;
    if services.indexer.reset_index(project_id).await? {
        println!("Deleted the index of project '{}'", project_id);
    } else {
        println!("Project '{}' has no index", project_id);
    }
    Ok(())
}

pub async fn run_search(config: &Config, project_id: &str, query: &str, limit: usize) -> Result<()> {
    let services = Services::from_config(config).await?;
    let results = services.rag.search(project_id, query, limit).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, doc) in results.iter().enumerate() {
        let snippet: String = doc.text.chars().take(200).collect();
        println!("{}. [{:.3}] {}", i + 1, doc.score, snippet.replace('\n', " "));
        if let Some(source) = doc
            .metadata
            .as_ref()
            .and_then(|m| m.get("source"))
            .and_then(|s| s.as_str())
        {
            println!("    source: {}", source);
        }
    }
    Ok(())
}

pub async fn run_answer(
    config: &Config,
    project_id: &str,
    query: &str,
    limit: usize,
    language: Option<&str>,
    show_prompt: bool,
) -> Result<()> {
    let services = Services::from_config(config).await?;
    let rag = services.rag.with_language(language);

    match rag.answer(project_id, query, limit).await? {
        AnswerOutcome::Answer(answer) => {
            if show_prompt {
                for message in &answer.chat_history {
                    println!("--- {} ---\n{}\n", message.role.as_str(), message.content);
                }
                println!("--- prompt ---\n{}\n", answer.full_prompt);
            }
            println!("{}", answer.answer);
            Ok(())
        }
        AnswerOutcome::NoMatches => {
            println!("No indexed documents matched the question.");
            Ok(())
        }
        AnswerOutcome::GenerationFailed { cause, .. } => {
            Err(anyhow::anyhow!(cause).context("answer generation failed"))
        }
    }
}

pub async fn run_projects(config: &Config, page: u32, page_size: u32) -> Result<()> {
    let docs = open_document_store(config).await?;
    let (projects, total_pages) = docs.list_projects(page, page_size).await?;

    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }

    for project in &projects {
        let chunks = docs.count_chunks(project.id).await?;
        let assets = docs.list_assets(project.id).await?;
        println!(
            "{:<24} {:>4} assets {:>7} chunks",
            project.project_id,
            assets.len(),
            chunks
        );
    }
    println!("page {} of {}", page.max(1), total_pages);
    Ok(())
}
