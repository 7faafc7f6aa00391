//! Anonymous sign-in
//!
//! Sessions are bearer tokens carrying the session uid. Presenting a
//! known uid reuses that session; anything else gets a fresh one. Public
//! review payloads only ever show the uid's 8-character prefix.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use booknook_common::identity::{ensure_anonymous_session, AnonymousClient};
use booknook_common::models::AnonymousSession;

use crate::error::ApiResult;
use crate::AppState;

/// Session uid from an `Authorization: Bearer <uid>` header
pub fn bearer_uid(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
}

/// POST /api/session
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<AnonymousSession>> {
    let existing = match bearer_uid(&headers) {
        Some(uid) => state.sessions.lookup(uid).await,
        None => None,
    };

    let client = match existing {
        Some(session) => AnonymousClient::with_session(state.sessions.clone(), session),
        None => AnonymousClient::new(state.sessions.clone()),
    };

    let session = ensure_anonymous_session(&client).await?;
    Ok(Json(session))
}
