//! Review endpoints
//!
//! - GET one-shot snapshot of a book's reviews
//! - POST a new review under the caller's anonymous session
//! - GET a live SSE feed of full review snapshots

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use booknook_common::sse::create_review_sse_stream;
use booknook_common::store::subscribe_reviews;
use booknook_common::widget::POST_ERROR_MESSAGE;
use booknook_common::{sort_newest_first, NewReview, Rating, Review};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::session::bearer_uid;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub reviews: Vec<Review>,
}

/// Body of a review submission
#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(default = "default_rating")]
    pub rating: i64,
    pub text: String,
}

fn default_rating() -> i64 {
    Rating::default().value() as i64
}

#[derive(Debug, Serialize)]
pub struct CreateReviewResponse {
    pub id: String,
}

/// GET /api/books/:id/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> ApiResult<Json<ReviewsResponse>> {
    let store = state.connection.get_shared_connection().await?;
    let mut reviews = store.reviews_for_book(&state.collection, &book_id).await?;
    sort_newest_first(&mut reviews);

    Ok(Json(ReviewsResponse {
        reviews: reviews.into_iter().map(Review::into_public).collect(),
    }))
}

/// POST /api/books/:id/reviews
///
/// Requires `Authorization: Bearer <uid>` naming an issued session.
/// Validation failures, malformed bodies included, never reach the store.
pub async fn create_review(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.require(bearer_uid(&headers)).await?;
    let Json(request) = body?;
    let rating = Rating::new(request.rating)?;
    let review = NewReview::new(book_id.as_str(), session.uid.as_str(), rating, request.text)?;

    let store = state.connection.get_shared_connection().await.map_err(|e| {
        error!(book_id = %book_id, "Store unavailable for review write: {}", e);
        ApiError::Internal(POST_ERROR_MESSAGE.to_string())
    })?;

    let id = store
        .add_review(&state.collection, review)
        .await
        .map_err(|e| {
            error!(book_id = %book_id, "Error adding review: {}", e);
            ApiError::Internal(POST_ERROR_MESSAGE.to_string())
        })?;

    info!(book_id = %book_id, review_id = %id, uid = %session.uid, "Review posted");
    Ok((StatusCode::CREATED, Json(CreateReviewResponse { id })))
}

/// GET /api/books/:id/reviews/live
///
/// The first event carries the current set; each later event the full
/// set after a change. Closing the connection ends the subscription.
pub async fn live_reviews(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = state.connection.get_shared_connection().await?;
    let subscription = subscribe_reviews(store, state.collection.clone(), book_id);
    Ok(create_review_sse_stream(
        crate::MODULE_NAME,
        subscription,
        state.shutdown.clone(),
    ))
}
