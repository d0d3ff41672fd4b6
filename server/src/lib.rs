pub mod shell;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use booksearch_core::book::format_date;
use booksearch_core::{Book, BookSearcher, DocumentStore, FieldWeights, SearchError, Settings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub rank: usize,
    pub score: f32,
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub sale_price: Option<f64>,
    pub original_price: Option<f64>,
}

impl SearchHit {
    fn new(rank: usize, score: f32, book: &Book) -> Self {
        Self {
            rank,
            score,
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            publisher: book.publisher.clone(),
            publication_date: book.publication_date.map(format_date),
            sale_price: book.sale_price,
            original_price: book.original_price,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub searcher: Arc<BookSearcher>,
    pub settings: Arc<Settings>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Parse repeated `field=weight` assignments.
pub fn parse_weights(assignments: &[String]) -> Result<FieldWeights> {
    let mut weights = FieldWeights::default();
    for a in assignments {
        weights.parse_assignment(a).map_err(|e| anyhow!(e))?;
    }
    Ok(weights)
}

/// Load the record collection and open the index. Either failing is fatal.
pub fn open_searcher(settings: &Settings) -> Result<BookSearcher> {
    let documents = DocumentStore::load(&settings.records_path)
        .with_context(|| format!("loading record collection {}", settings.records_path.display()))?;
    let searcher = BookSearcher::open(&settings.index_dir, Arc::new(documents))
        .with_context(|| format!("opening index {}", settings.index_dir.display()))?
        .with_weights(settings.field_weights.clone());
    Ok(searcher)
}

pub fn build_app(settings: Settings) -> Result<Router> {
    let searcher = open_searcher(&settings)?;
    Ok(router(AppState { searcher: Arc::new(searcher), settings: Arc::new(settings) }))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/book/:isbn", get(book_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let limit = state.settings.limit(params.k);
    let ranked = match state.searcher.search_ranked(&params.q, limit) {
        Ok(ranked) => ranked,
        Err(SearchError::Parse(e)) => return Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            tracing::error!(error = %e, query = %params.q, "search failed");
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "search failed"));
        }
    };
    let results = ranked
        .books
        .iter()
        .enumerate()
        .map(|(i, r)| SearchHit::new(i + 1, r.score, &r.book))
        .collect();
    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits = ranked.total, took_s = elapsed.as_secs_f64(), "search");
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits: ranked.total, results }))
}

pub async fn book_handler(State(state): State<AppState>, Path(isbn): Path<String>) -> Result<Json<Book>, ApiError> {
    state
        .searcher
        .documents()
        .resolve(&isbn)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no book with isbn {isbn}")))
}
