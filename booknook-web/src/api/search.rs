//! Catalog search proxy

use axum::{
    extract::{Query, State},
    Json,
};
use booknook_common::BookSummary;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub books: Vec<BookSummary>,
}

/// GET /api/search?q=<text>
///
/// Forwards the query to the catalog and returns at most 18 summaries.
pub async fn search_books(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let q = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Search query is required".to_string()))?;

    let books = state.catalog.search(&q).await.map_err(|e| {
        error!(query = %q, "Catalog search failed: {}", e);
        e
    })?;

    Ok(Json(SearchResponse { books }))
}
