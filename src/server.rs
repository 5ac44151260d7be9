//! JSON HTTP surface over the core pipeline.
//!
//! # Endpoints
//!
//! | Method   | Path        | Description |
//! |----------|-------------|-------------|
//! | `POST`   | `/messages` | Ingest a batch of messages |
//! | `POST`   | `/search`   | Semantic / hybrid / listing search |
//! | `DELETE` | `/messages` | Delete chunks by ids and/or username |
//! | `POST`   | `/fetch`    | Pull posts from the remote source and ingest them |
//! | `GET`    | `/health`   | Health check (returns version) |
//!
//! # Error contract
//!
//! Errors are returned as `{ "error": { "code": ..., "message": ... } }`.
//! Validation failures map to 400; upstream failures (embedding provider,
//! index, message source) map to 502.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::chunker::MessageChunker;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::Error;
use crate::fetcher::PostsClient;
use crate::filter::MetadataFilter;
use crate::index::VectorIndex;
use crate::index_http::ChromaHttpIndex;
use crate::ingest::{delete_chunks, ingest_messages, DeleteSelector};
use crate::models::{Message, SearchResults};
use crate::search::{search, SearchRequest, DEFAULT_SEARCH_LIMIT};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Arc<MessageChunker>,
    fetcher: Option<Arc<PostsClient>>,
}

/// Start the HTTP server on the configured bind address.
///
/// The index collection is created (idempotently) at startup so the first
/// request does not pay for it.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let index: Arc<dyn VectorIndex> = Arc::new(ChromaHttpIndex::new(&config.index)?);
    let embedder = create_provider(&config.embedding)?;
    let chunker = Arc::new(MessageChunker::from_config(&config.chunking)?);
    let fetcher = match &config.fetcher {
        Some(cfg) => Some(Arc::new(PostsClient::new(cfg)?)),
        None => None,
    };

    index.ensure_collection().await?;

    let state = AppState {
        index,
        embedder,
        chunker,
        fetcher,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/messages", post(handle_add).delete(handle_delete))
        .route("/search", post(handle_search))
        .route("/fetch", post(handle_fetch))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!(bind = %config.server.bind, "server listening");
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
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

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::InvalidDeleteSelector | Error::MalformedMessage(_) | Error::Config(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            Error::EmbeddingUnavailable(_) => (StatusCode::BAD_GATEWAY, "embedding_unavailable"),
            Error::IndexUnavailable(_) => (StatusCode::BAD_GATEWAY, "index_unavailable"),
            Error::SourceUnavailable(_) => (StatusCode::BAD_GATEWAY, "source_unavailable"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
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

// ============ POST /messages ============

/// Inbound message shape accepted by the API.
#[derive(Deserialize)]
struct InboundMessage {
    message_id: i64,
    text: String,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    username: String,
}

impl From<InboundMessage> for Message {
    fn from(m: InboundMessage) -> Self {
        Message::new(m.username, m.message_id.to_string(), m.date, m.text)
    }
}

#[derive(Serialize)]
struct AddResponse {
    added: u64,
}

async fn handle_add(
    State(state): State<AppState>,
    Json(body): Json<Vec<InboundMessage>>,
) -> Result<Json<AddResponse>, AppError> {
    let messages: Vec<Message> = body.into_iter().map(Message::from).collect();
    let added = ingest_messages(
        state.index.as_ref(),
        state.embedder.as_ref(),
        &state.chunker,
        &messages,
    )
    .await?;
    Ok(Json(AddResponse { added }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchBody {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    n_results: Option<usize>,
    /// Token symbols turned into full-text contains terms.
    #[serde(default)]
    tokens: Option<Vec<String>>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    unique: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResults>, AppError> {
    let request = SearchRequest {
        query: body.query,
        limit: body.n_results.unwrap_or(DEFAULT_SEARCH_LIMIT),
        metadata_filter: body.username.map(MetadataFilter::by_username),
        text_filter: None,
        full_text_terms: crate::tickers::expand_terms(&body.tokens.unwrap_or_default()),
        unique: body.unique,
    };
    let results = search(state.index.as_ref(), state.embedder.as_ref(), &request).await?;
    Ok(Json(results))
}

// ============ DELETE /messages ============

#[derive(Deserialize)]
struct DeleteBody {
    #[serde(default)]
    ids: Option<Vec<String>>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted_ids: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    selector: Option<String>,
}

async fn handle_delete(
    State(state): State<AppState>,
    Json(body): Json<DeleteBody>,
) -> Result<Json<DeleteResponse>, AppError> {
    let selector = body.username.clone().map(|username| DeleteSelector {
        username: Some(username),
    });
    delete_chunks(
        state.index.as_ref(),
        body.ids.as_deref(),
        selector.as_ref(),
    )
    .await?;
    Ok(Json(DeleteResponse {
        deleted_ids: body.ids.map(|ids| ids.len()).unwrap_or(0),
        selector: body.username,
    }))
}

// ============ POST /fetch ============

#[derive(Deserialize)]
struct FetchBody {
    #[serde(default)]
    usernames: Option<Vec<String>>,
    #[serde(default = "default_fetch_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_fetch_limit() -> usize {
    500
}

#[derive(Serialize)]
struct FetchResponse {
    fetched: usize,
    added: u64,
}

async fn handle_fetch(
    State(state): State<AppState>,
    Json(body): Json<FetchBody>,
) -> Result<Json<FetchResponse>, AppError> {
    let Some(fetcher) = state.fetcher.as_ref() else {
        return Err(bad_request("no [fetcher] section configured"));
    };
    let messages = fetcher
        .fetch_posts(
            body.usernames.as_deref().unwrap_or(&[]),
            body.limit,
            body.offset,
        )
        .await?;
    let added = ingest_messages(
        state.index.as_ref(),
        state.embedder.as_ref(),
        &state.chunker,
        &messages,
    )
    .await?;
    Ok(Json(FetchResponse {
        fetched: messages.len(),
        added,
    }))
}
