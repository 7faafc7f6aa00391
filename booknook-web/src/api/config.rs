//! Public client configuration

use axum::{extract::State, Json};

use crate::config::PublicConfig;
use crate::AppState;

/// GET /api/config
///
/// Identifiers a browser client needs; never includes secrets.
pub async fn get_public_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(state.public_config.clone())
}
