//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response. Clients read the limits to size their chunks.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub max_value_len: usize,
    pub max_keys_per_user: usize,
    pub max_batch_keys: usize,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        max_value_len: state.config.max_value_len,
        max_keys_per_user: state.config.max_keys_per_user,
        max_batch_keys: state.config.max_batch_keys,
    })
}

async fn root() -> &'static str {
    "VocabSync Server"
}
