//! Key-value routes, scoped to one user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_batch_get, handle_batch_remove, handle_delete, handle_get, handle_put,
    BatchGetResponse, BatchRemoveResponse, ItemResponse, KeysRequest, PutItemRequest,
};
use crate::AppState;

/// Create item routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/users/{user_id}/items/{key}",
            get(get_item).put(put_item).delete(delete_item),
        )
        .route("/v1/users/{user_id}/batch/get", post(batch_get))
        .route("/v1/users/{user_id}/batch/remove", post(batch_remove))
}

/// GET /v1/users/{user_id}/items/{key}
async fn get_item(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((user_id, key)): Path<(String, String)>,
) -> Result<Json<ItemResponse>> {
    Ok(Json(handle_get(&state.store, &user_id, &key)?))
}

/// PUT /v1/users/{user_id}/items/{key}
async fn put_item(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((user_id, key)): Path<(String, String)>,
    Json(request): Json<PutItemRequest>,
) -> Result<Json<ItemResponse>> {
    Ok(Json(handle_put(&state.store, &user_id, &key, request)?))
}

/// DELETE /v1/users/{user_id}/items/{key}
async fn delete_item(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((user_id, key)): Path<(String, String)>,
) -> Result<StatusCode> {
    handle_delete(&state.store, &user_id, &key)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/users/{user_id}/batch/get
async fn batch_get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<KeysRequest>,
) -> Result<Json<BatchGetResponse>> {
    Ok(Json(handle_batch_get(&state.store, &user_id, request)?))
}

/// POST /v1/users/{user_id}/batch/remove
async fn batch_remove(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<KeysRequest>,
) -> Result<Json<BatchRemoveResponse>> {
    Ok(Json(handle_batch_remove(&state.store, &user_id, request)?))
}
