//! End-to-end pipeline over the SQLite document store: process → index →
//! search → answer.

mod common;

use common::{sqlite_store, stub_services, test_config, RecordingGenerator};
use tempfile::TempDir;

use ragline_core::chunk::Segment;
use ragline_core::docstore::DocumentStore;
use ragline_core::embedding::EmbedMode;
use ragline_core::error::RagError;
use ragline_core::models::{Metadata, NewAsset, NewChunk, Role};
use ragline_core::rag::AnswerOutcome;

const PARIS: &str = "Paris is the capital of France.";
const POPULATION: &str = "It has a population of about 2 million.";

fn segments(texts: &[&str]) -> Vec<Segment> {
    texts
        .iter()
        .map(|t| Segment {
            text: t.to_string(),
            metadata: Metadata::new(),
        })
        .collect()
}

#[tokio::test]
async fn test_process_index_and_answer() {
    let tmp = TempDir::new().unwrap();
    let (services, embedder, generator) =
        stub_services(&tmp, RecordingGenerator::answering("Paris.")).await;

    let req = services.process_request("facts.txt".into(), 70, segments(&[PARIS, POPULATION]), false);
    let report = services.processor.process("abc123", &req).await.unwrap();
    assert_eq!(report.inserted_chunks, 2);

    let inserted = services.indexer.push_index("abc123", true).await.unwrap();
    assert_eq!(inserted, 2);
    assert!(embedder
        .modes
        .lock()
        .unwrap()
        .iter()
        .all(|m| *m == EmbedMode::Document));

    let hits = services
        .rag
        .search("abc123", "What is the capital of France?", 1)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, PARIS);
    assert_eq!(embedder.modes.lock().unwrap().last(), Some(&EmbedMode::Query));

    let outcome = services
        .rag
        .answer("abc123", "What is the capital of France?", 1)
        .await
        .unwrap();
    let AnswerOutcome::Answer(answer) = outcome else {
        panic!("expected an answer");
    };
    assert_eq!(answer.answer, "Paris.");
    assert!(answer
        .full_prompt
        .contains(&format!("## Document No: 1\n### Content: {}", PARIS)));
    assert!(answer
        .full_prompt
        .contains("Based only on the above documents, please generate an answer for the user."));
    assert_eq!(answer.chat_history.len(), 1);
    assert_eq!(answer.chat_history[0].role, Role::System);

    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].last().unwrap().role, Role::User);
}

#[tokio::test]
async fn test_reset_applies_only_before_first_page() {
    let tmp = TempDir::new().unwrap();
    let (services, _, _) = stub_services(&tmp, RecordingGenerator::answering("ok")).await;

    let project = services.docs.get_or_create_project("p15").await.unwrap();
    let chunks: Vec<NewChunk> = (1..=15)
        .map(|order| NewChunk {
            project_id: project.id,
            asset_id: None,
            order,
            text: format!("chunk number {}", order),
            metadata: Metadata::new(),
        })
        .collect();
    services.docs.insert_chunks(&chunks).await.unwrap();

    // page_size is 10, so this spans two pages
    let inserted = services.indexer.push_index("p15", true).await.unwrap();
    assert_eq!(inserted, 15);
    let info = services.indexer.get_index_info("p15").await.unwrap();
    assert_eq!(info.points_count, 15);
}

#[tokio::test]
async fn test_reset_then_incremental_push_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let (services, _, _) = stub_services(&tmp, RecordingGenerator::answering("ok")).await;

    let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron";
    let req = services.process_request("greek.txt".into(), text.len() as u64, segments(&[text]), false);
    let report = services.processor.process("greek", &req).await.unwrap();

    services.indexer.push_index("greek", true).await.unwrap();
    services.indexer.push_index("greek", true).await.unwrap();
    services.indexer.push_index("greek", false).await.unwrap();

    let info = services.indexer.get_index_info("greek").await.unwrap();
    assert_eq!(info.points_count, report.inserted_chunks as u64);
}

#[tokio::test]
async fn test_answer_distinguishes_no_matches_and_generation_failure() {
    let tmp = TempDir::new().unwrap();
    let (services, _, generator) = stub_services(&tmp, RecordingGenerator::failing()).await;

    let outcome = services.rag.answer("empty", "anything", 3).await.unwrap();
    assert!(matches!(outcome, AnswerOutcome::NoMatches));
    assert!(generator.calls.lock().unwrap().is_empty());

    let req = services.process_request("facts.txt".into(), 31, segments(&[PARIS]), false);
    services.processor.process("facts", &req).await.unwrap();
    services.indexer.push_index("facts", false).await.unwrap();

    match services.rag.answer("facts", "capital of France", 1).await.unwrap() {
        AnswerOutcome::GenerationFailed { cause, full_prompt, .. } => {
            assert!(matches!(cause, RagError::Provider(_)));
            assert!(full_prompt.contains(PARIS));
        }
        other => panic!("expected GenerationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sqlite_chunk_pages_are_ordered_by_asset_then_order() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let docs = sqlite_store(&config).await;

    let project = docs.get_or_create_project("ordered").await.unwrap();
    let a = docs
        .create_asset(&NewAsset {
            project_id: project.id,
            asset_type: ragline_core::models::AssetType::File,
            name: "a.txt".into(),
            size: 10,
        })
        .await
        .unwrap();
    let b = docs
        .create_asset(&NewAsset {
            project_id: project.id,
            asset_type: ragline_core::models::AssetType::File,
            name: "b.txt".into(),
            size: 10,
        })
        .await
        .unwrap();

    let chunk = |asset_id: i64, order: i64| NewChunk {
        project_id: project.id,
        asset_id: Some(asset_id),
        order,
        text: format!("{}-{}", asset_id, order),
        metadata: Metadata::new(),
    };
    docs.insert_chunks(&[chunk(b.id, 2), chunk(a.id, 2), chunk(b.id, 1), chunk(a.id, 1)])
        .await
        .unwrap();

    let first = docs.get_chunk_page(project.id, 1, 3).await.unwrap();
    let second = docs.get_chunk_page(project.id, 2, 3).await.unwrap();
    let third = docs.get_chunk_page(project.id, 3, 3).await.unwrap();

    let keys: Vec<(Option<i64>, i64)> = first
        .iter()
        .chain(second.iter())
        .map(|c| (c.asset_id, c.order))
        .collect();
    assert_eq!(
        keys,
        vec![
            (Some(a.id), 1),
            (Some(a.id), 2),
            (Some(b.id), 1),
            (Some(b.id), 2)
        ]
    );
    assert!(third.is_empty());
    assert_eq!(docs.count_chunks(project.id).await.unwrap(), 4);
}

#[tokio::test]
async fn test_sqlite_asset_upsert_keeps_id() {
    let tmp = TempDir::new().unwrap();
    let docs = sqlite_store(&test_config(&tmp)).await;
    let project = docs.get_or_create_project("assets").await.unwrap();

    let new_asset = |size| NewAsset {
        project_id: project.id,
        asset_type: ragline_core::models::AssetType::File,
        name: "report.pdf".into(),
        size,
    };
    let first = docs.create_asset(&new_asset(100)).await.unwrap();
    let second = docs.create_asset(&new_asset(250)).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.size, 250);
    assert_eq!(docs.list_assets(project.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_bulk_insert_spans_several_statements() {
    let tmp = TempDir::new().unwrap();
    let docs = sqlite_store(&test_config(&tmp)).await;
    let project = docs.get_or_create_project("bulk").await.unwrap();

    let chunks: Vec<NewChunk> = (1..=1201)
        .map(|order| NewChunk {
            project_id: project.id,
            asset_id: None,
            order,
            text: format!("chunk {}", order),
            metadata: Metadata::new(),
        })
        .collect();
    assert_eq!(docs.insert_chunks(&chunks).await.unwrap(), 1201);
    assert_eq!(docs.count_chunks(project.id).await.unwrap(), 1201);

    let last = docs.get_chunk_page(project.id, 13, 100).await.unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].order, 1201);
}

#[tokio::test]
async fn test_sqlite_rejects_duplicate_chunk_order() {
    let tmp = TempDir::new().unwrap();
    let docs = sqlite_store(&test_config(&tmp)).await;
    let project = docs.get_or_create_project("dupes").await.unwrap();

    let chunk = NewChunk {
        project_id: project.id,
        asset_id: None,
        order: 1,
        text: "x".into(),
        metadata: Metadata::new(),
    };
    docs.insert_chunks(std::slice::from_ref(&chunk)).await.unwrap();

    let asset = docs
        .create_asset(&NewAsset {
            project_id: project.id,
            asset_type: ragline_core::models::AssetType::File,
            name: "a.txt".into(),
            size: 1,
        })
        .await
        .unwrap();
    let with_asset = NewChunk {
        asset_id: Some(asset.id),
        ..chunk
    };
    docs.insert_chunks(std::slice::from_ref(&with_asset))
        .await
        .unwrap();
    assert!(matches!(
        docs.insert_chunks(std::slice::from_ref(&with_asset)).await,
        Err(RagError::Store(_))
    ));
    assert!(matches!(
        docs.insert_chunks(&[NewChunk {
            order: 0,
            ..with_asset
        }])
        .await,
        Err(RagError::Validation(_))
    ));
}

#[tokio::test]
async fn test_sqlite_projects_are_paged() {
    let tmp = TempDir::new().unwrap();
    let docs = sqlite_store(&test_config(&tmp)).await;
    for id in ["p1", "p2", "p3", "p4", "p5"] {
        docs.get_or_create_project(id).await.unwrap();
    }
    docs.get_or_create_project("p1").await.unwrap();

    let (page, total_pages) = docs.list_projects(1, 2).await.unwrap();
    assert_eq!(total_pages, 3);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].project_id, "p1");

    let (last, _) = docs.list_projects(3, 2).await.unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].project_id, "p5");

    assert!(matches!(
        docs.get_or_create_project("bad id").await,
        Err(RagError::Validation(_))
    ));
}

#[tokio::test]
async fn test_reprocessing_with_reset_clears_other_assets() {
    let tmp = TempDir::new().unwrap();
    let (services, _, _) = stub_services(&tmp, RecordingGenerator::answering("ok")).await;

    let a = services.process_request("a.txt".into(), 31, segments(&[PARIS]), false);
    let b = services.process_request("b.txt".into(), 39, segments(&[POPULATION]), false);
    services.processor.process("multi", &a).await.unwrap();
    services.processor.process("multi", &b).await.unwrap();

    let project = services.docs.get_project("multi").await.unwrap().unwrap();
    assert_eq!(services.docs.count_chunks(project.id).await.unwrap(), 2);

    let b_reset = services.process_request("b.txt".into(), 39, segments(&[POPULATION]), true);
    services.processor.process("multi", &b_reset).await.unwrap();
    assert_eq!(services.docs.count_chunks(project.id).await.unwrap(), 1);
}
