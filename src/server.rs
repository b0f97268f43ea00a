//! HTTP API server.
//!
//! Exposes processing, indexing, search, and answering over JSON. Handlers
//! are thin: each one validates its body, calls into [`Services`], and maps
//! [`RagError`] kinds to HTTP statuses.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/data/process/{project_id}` | Split text into stored chunks |
//! | `POST` | `/api/v1/nlp/index/push/{project_id}` | (Re)build the project's vector index |
//! | `GET`  | `/api/v1/nlp/index/info/{project_id}` | Collection size, metric, point count |
//! | `DELETE` | `/api/v1/nlp/index/{project_id}` | Drop the project's collection |
//! | `POST` | `/api/v1/nlp/index/search/{project_id}` | Similarity search |
//! | `POST` | `/api/v1/nlp/index/answer/{project_id}` | Grounded answer generation |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "project_id must be alphanumeric, got 'a-b'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `no_matches` (404),
//! `provider_error` (502), `partial_failure` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use ragline_core::chunk::Segment;
use ragline_core::error::RagError;
use ragline_core::models::{CollectionInfo, PromptMessage, RetrievedDocument};
use ragline_core::process::ProcessReport;
use ragline_core::rag::AnswerOutcome;

use crate::config::Config;
use crate::services::Services;

type AppState = Arc<Services>;

/// Build the services from `config` and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(Services::from_config(config).await?);
    let bind_addr = config.server.bind.clone();
    let app = router(services);

    println!("ragline server listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// All routes over the given services.
pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/data/process/{project_id}", post(handle_process))
        .route("/nlp/index/push/{project_id}", post(handle_push))
        .route("/nlp/index/info/{project_id}", get(handle_info))
        .route("/nlp/index/{project_id}", delete(handle_reset))
        .route("/nlp/index/search/{project_id}", post(handle_search))
        .route("/nlp/index/answer/{project_id}", post(handle_answer));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn provider_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "provider_error".to_string(),
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let message = err.to_string();
        match &err {
            RagError::Validation(_) => bad_request(message),
            RagError::NotFound(_) => not_found(message),
            RagError::Provider(_) => provider_error(message),
            RagError::PartialFailure { .. } => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "partial_failure".to_string(),
                message,
            },
            _ => {
                error!(code = err.code(), error = %message, "request failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal".to_string(),
                    message,
                }
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /data/process/{project_id} ============

/// Either `text` or `segments` must be given.
#[derive(Deserialize)]
struct ProcessBody {
    asset_name: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    segments: Option<Vec<Segment>>,
    #[serde(default)]
    chunk_size: Option<usize>,
    #[serde(default)]
    overlap_size: Option<usize>,
    #[serde(default)]
    do_reset: bool,
}

async fn handle_process(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<ProcessBody>,
) -> Result<Json<ProcessReport>, AppError> {
    if body.asset_name.trim().is_empty() {
        return Err(bad_request("asset_name must not be empty"));
    }
    let segments = match (body.text, body.segments) {
        (Some(text), None) => {
            let mut metadata = ragline_core::models::Metadata::new();
            metadata.insert("source".to_string(), json!(body.asset_name));
            vec![Segment { text, metadata }]
        }
        (None, Some(segments)) => segments,
        _ => return Err(bad_request("exactly one of text or segments is required")),
    };
    let size = segments.iter().map(|s| s.text.len() as u64).sum();

    let mut req = state.process_request(body.asset_name, size, segments, body.do_reset);
    if let Some(chunk_size) = body.chunk_size {
        req.chunk_size = chunk_size;
    }
    if let Some(overlap) = body.overlap_size {
        req.overlap = overlap;
    }

    let report = state.processor.process(&project_id, &req).await?;
    Ok(Json(report))
}

// ============ POST /nlp/index/push/{project_id} ============

#[derive(Deserialize)]
struct PushBody {
    #[serde(default)]
    do_reset: bool,
}

#[derive(Serialize)]
struct PushResponse {
    inserted_items_count: usize,
}

async fn handle_push(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: Option<Json<PushBody>>,
) -> Result<Json<PushResponse>, AppError> {
    let do_reset = body.map(|Json(b)| b.do_reset).unwrap_or(false);
    let inserted = state.indexer.push_index(&project_id, do_reset).await?;
    Ok(Json(PushResponse {
        inserted_items_count: inserted,
    }))
}

// ============ GET /nlp/index/info/{project_id} ============

#[derive(Serialize)]
struct InfoResponse {
    collection_info: CollectionInfo,
}

async fn handle_info(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<InfoResponse>, AppError> {
    let info = state.indexer.get_index_info(&project_id).await?;
    Ok(Json(InfoResponse {
        collection_info: info,
    }))
}

// ============ DELETE /nlp/index/{project_id} ============

#[derive(Serialize)]
struct ResetResponse {
    deleted: bool,
}

async fn handle_reset(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<ResetResponse>, AppError> {
    let deleted = state.indexer.reset_index(&project_id).await?;
    Ok(Json(ResetResponse { deleted }))
}

// ============ POST /nlp/index/search/{project_id} ============

#[derive(Deserialize)]
struct SearchBody {
    text: String,
    #[serde(default = "default_limit")]
    limit: usize,
    /// Template language for answers; ignored by search.
    #[serde(default)]
    language: Option<String>,
}

fn default_limit() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedDocument>,
}

async fn handle_search(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError> {
    let results = state
        .rag
        .search(&project_id, &body.text, body.limit)
        .await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /nlp/index/answer/{project_id} ============

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
    full_prompt: String,
    chat_history: Vec<PromptMessage>,
}

async fn handle_answer(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<SearchBody>,
) -> Result<Json<AnswerResponse>, AppError> {
    let outcome = match body.language.as_deref() {
        Some(language) => {
            state
                .rag
                .with_language(Some(language))
                .answer(&project_id, &body.text, body.limit)
                .await?
        }
        None => state.rag.answer(&project_id, &body.text, body.limit).await?,
    };

    match outcome {
        AnswerOutcome::Answer(answer) => Ok(Json(AnswerResponse {
            answer: answer.answer,
            full_prompt: answer.full_prompt,
            chat_history: answer.chat_history,
        })),
        AnswerOutcome::NoMatches => Err(AppError {
            status: StatusCode::NOT_FOUND,
            code: "no_matches".to_string(),
            message: format!("no indexed documents matched in project '{}'", project_id),
        }),
        AnswerOutcome::GenerationFailed { cause, .. } => {
            Err(provider_error(format!("answer generation failed: {}", cause)))
        }
    }
}
