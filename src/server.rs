//! HTTP tool server.
//!
//! Exposes the search core to coding agents as a JSON tool API:
//!
//! | Method | Path | Tool |
//! |--------|------|------|
//! | `POST` | `/tools/search` | Basic hybrid search |
//! | `POST` | `/tools/search_advanced` | Reflexion search |
//! | `POST` | `/tools/context` | File context bundle |
//! | `POST` | `/tools/types` | Type-definition search |
//! | `POST` | `/tools/similar` | Code similarity search |
//! | `POST` | `/tools/memories` | Conversation-memory search |
//! | `GET`  | `/tools/status` | Index status |
//! | `GET`  | `/health` | Liveness check |
//!
//! # Error Contract
//!
//! Tools never fail at the HTTP level: every handler answers `200` with
//! either the tool's success shape or `{"error": message}` plus the request
//! echo, so agents can always parse the body. Unknown request keys are
//! rejected at parse time (`deny_unknown_fields`).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients and cross-origin tool calls.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::context::{self, ContextOptions};
use crate::models::ChunkType;
use crate::search::{
    self, AdvancedSearchOptions, BasicSearchOptions, MemorySearchOptions, SimilarityOptions,
    TypeSearchOptions,
};
use crate::status;
use crate::store::http::HttpStore;
use crate::store::Store;

/// Shared application state: config plus the process-wide store client,
/// cloned into every handler.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn Store>,
}

/// Start the tool server on the configured bind address.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(HttpStore::new(&config.store)?);

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/tools/search", post(handle_search))
        .route("/tools/search_advanced", post(handle_search_advanced))
        .route("/tools/context", post(handle_context))
        .route("/tools/types", post(handle_types))
        .route("/tools/similar", post(handle_similar))
        .route("/tools/memories", post(handle_memories))
        .route("/tools/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Tool server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Serialize a tool response, or fold a serialization failure into the
/// error contract.
fn tool_response<T: serde::Serialize>(result: crate::error::Result<T>, echo: Value) -> Json<Value> {
    match result {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(value) => Json(value),
            Err(e) => Json(error_body(&e.to_string(), echo)),
        },
        Err(e) => Json(error_body(&e.to_string(), echo)),
    }
}

fn error_body(message: &str, echo: Value) -> Value {
    let mut body = json!({ "error": message });
    if let (Some(body_map), Some(echo_map)) = (body.as_object_mut(), echo.as_object()) {
        for (k, v) in echo_map {
            body_map.insert(k.clone(), v.clone());
        }
    }
    body
}

// ============ POST /tools/search ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchToolRequest {
    query: String,
    project: Option<String>,
    limit: Option<usize>,
    chunk_types: Option<Vec<ChunkType>>,
    alpha: Option<f64>,
    #[serde(default)]
    rewrite: bool,
    #[serde(default)]
    autocut: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchToolRequest>,
) -> Json<Value> {
    let opts = BasicSearchOptions {
        project: req
            .project
            .unwrap_or_else(|| state.config.search.default_project.clone()),
        limit: req.limit.unwrap_or(state.config.search.default_limit),
        chunk_types: req.chunk_types,
        alpha: req.alpha.unwrap_or(state.config.search.default_alpha),
        rewrite: req.rewrite,
        autocut: req.autocut,
    };

    tracing::debug!(query = %req.query, project = %opts.project, "tool: search");
    let result = search::basic_search(state.store.as_ref(), &req.query, &opts).await;
    tool_response(result, json!({ "query": req.query }))
}

// ============ POST /tools/search_advanced ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AdvancedToolRequest {
    query: String,
    project: Option<String>,
    limit: Option<usize>,
    chunk_types: Option<Vec<ChunkType>>,
    threshold: Option<f64>,
    max_attempts: Option<usize>,
}

async fn handle_search_advanced(
    State(state): State<AppState>,
    Json(req): Json<AdvancedToolRequest>,
) -> Json<Value> {
    let opts = AdvancedSearchOptions {
        project: req
            .project
            .unwrap_or_else(|| state.config.search.default_project.clone()),
        limit: req.limit.unwrap_or(state.config.search.default_limit),
        chunk_types: req.chunk_types,
        threshold: req.threshold.unwrap_or(state.config.search.threshold),
        max_attempts: req.max_attempts.unwrap_or(state.config.search.max_attempts),
    };

    tracing::debug!(query = %req.query, project = %opts.project, "tool: search_advanced");
    let result = search::advanced_search(state.store.as_ref(), &req.query, &opts).await;
    tool_response(result, json!({ "query": req.query }))
}

// ============ POST /tools/context ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ContextToolRequest {
    file_path: String,
    project: Option<String>,
    max_files: Option<usize>,
    include_types: Option<bool>,
}

async fn handle_context(
    State(state): State<AppState>,
    Json(req): Json<ContextToolRequest>,
) -> Json<Value> {
    let opts = ContextOptions {
        project: req
            .project
            .unwrap_or_else(|| state.config.search.default_project.clone()),
        max_files: req.max_files.unwrap_or(state.config.context.max_files),
        include_types: req.include_types.unwrap_or(true),
        aliases: state.config.context.aliases.clone(),
    };

    tracing::debug!(file = %req.file_path, project = %opts.project, "tool: context");
    let result = context::build_context(state.store.as_ref(), &req.file_path, &opts).await;
    tool_response(result, json!({ "filePath": req.file_path }))
}

// ============ POST /tools/types ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TypesToolRequest {
    query: String,
    project: Option<String>,
    limit: Option<usize>,
}

async fn handle_types(
    State(state): State<AppState>,
    Json(req): Json<TypesToolRequest>,
) -> Json<Value> {
    let opts = TypeSearchOptions {
        project: req
            .project
            .unwrap_or_else(|| state.config.search.default_project.clone()),
        limit: req.limit.unwrap_or(state.config.search.default_limit),
    };

    let result = search::type_search(state.store.as_ref(), &req.query, &opts).await;
    tool_response(result, json!({ "query": req.query }))
}

// ============ POST /tools/similar ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SimilarToolRequest {
    code: String,
    project: Option<String>,
    limit: Option<usize>,
}

async fn handle_similar(
    State(state): State<AppState>,
    Json(req): Json<SimilarToolRequest>,
) -> Json<Value> {
    let opts = SimilarityOptions {
        project: req
            .project
            .unwrap_or_else(|| state.config.search.default_project.clone()),
        limit: req.limit.unwrap_or(state.config.search.default_limit),
    };

    let result = search::similarity_search(state.store.as_ref(), &req.code, &opts).await;
    tool_response(result, json!({ "project": opts.project }))
}

// ============ POST /tools/memories ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MemoriesToolRequest {
    query: String,
    project: Option<String>,
    limit: Option<usize>,
}

async fn handle_memories(
    State(state): State<AppState>,
    Json(req): Json<MemoriesToolRequest>,
) -> Json<Value> {
    let opts = MemorySearchOptions {
        project: req.project,
        limit: req.limit.unwrap_or(5),
    };

    let result = search::memory_search(state.store.as_ref(), &req.query, &opts).await;
    tool_response(result, json!({ "query": req.query }))
}

// ============ GET /tools/status ============

async fn handle_status(State(state): State<AppState>) -> Json<Value> {
    let report = status::collect_status(state.store.as_ref()).await;
    match serde_json::to_value(&report) {
        Ok(value) => Json(value),
        Err(e) => Json(json!({ "status": "error", "error": e.to_string() })),
    }
}

// ============ GET /health ============

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
