use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::SearchError;
use crate::model::{CachedPage, CachedQuery, SearchRequest, SearchResponse};
use crate::pipeline::SearchPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SearchPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<SearchPipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/search", post(search))
        .route("/api/search/{search_id}", get(cached_page))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            SearchError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid request"),
            SearchError::NotFound(_) => (StatusCode::NOT_FOUND, "search not found"),
            SearchError::Fatal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "search failed"),
        };
        let message = match self {
            SearchError::InvalidRequest(m) | SearchError::NotFound(m) | SearchError::Fatal(m) => m,
        };
        (status, Json(json!({ "error": label, "message": message }))).into_response()
    }
}

async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, SearchError> {
    state.pipeline.search(req, None).await.map(Json)
}

async fn cached_page(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
    Query(q): Query<CachedQuery>,
) -> Result<Json<CachedPage>, SearchError> {
    state.pipeline.get_cached(&search_id, &q).map(Json)
}
