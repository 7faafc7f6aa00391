//! Page props endpoints
//!
//! Served through the revalidation caches in [`AppState`]; every response
//! advertises its window as `s-maxage` so a shared cache can follow the
//! same schedule.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::pages::{load_book_page, load_home_page, PageOutcome};
use crate::AppState;

const BOOK_NOT_FOUND: &str = "Book not found.";
const HOME_KEY: &str = "/";

/// GET /
pub async fn home_page(State(state): State<AppState>) -> Response {
    let catalog = state.catalog.clone();
    let outcome = state
        .home_page
        .get_or_render(HOME_KEY, move || async move { load_home_page(&catalog).await })
        .await;

    page_response(outcome)
}

/// GET /book/:id
pub async fn book_page(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let key = format!("/book/{}", id);
    let catalog = state.catalog.clone();
    let connection = state.connection.clone();
    let collection = state.collection.clone();

    let outcome = state
        .book_pages
        .get_or_render(&key, move || async move {
            load_book_page(&catalog, &connection, &collection, &id).await
        })
        .await;

    page_response(outcome)
}

fn page_response<T: Serialize>(outcome: PageOutcome<T>) -> Response {
    let cache_control = format!(
        "s-maxage={}, stale-while-revalidate",
        outcome.revalidate().as_secs()
    );

    let mut response = match outcome {
        PageOutcome::Props { props, .. } => Json(props).into_response(),
        PageOutcome::NotFound => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": BOOK_NOT_FOUND }))).into_response()
        }
        PageOutcome::Degraded { error, .. } => Json(json!({ "error": error })).into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}
