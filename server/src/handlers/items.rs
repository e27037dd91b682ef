//! Item and batch handlers.

use crate::error::{AppError, Result};
use crate::store::KvStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request body for writing one item.
#[derive(Debug, Deserialize)]
pub struct PutItemRequest {
    pub value: String,
}

/// A stored item.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Request body for batch reads and removals.
#[derive(Debug, Deserialize)]
pub struct KeysRequest {
    pub keys: Vec<String>,
}

/// Values of the requested keys that exist.
#[derive(Debug, Serialize)]
pub struct BatchGetResponse {
    pub values: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct BatchRemoveResponse {
    pub removed: usize,
}

pub fn handle_get(store: &KvStore, user: &str, key: &str) -> Result<ItemResponse> {
    let item = store
        .get(user, key)?
        .ok_or_else(|| AppError::NotFound(key.to_string()))?;
    Ok(ItemResponse {
        key: key.to_string(),
        value: item.value,
        updated_at: item.updated_at,
    })
}

pub fn handle_put(
    store: &KvStore,
    user: &str,
    key: &str,
    request: PutItemRequest,
) -> Result<ItemResponse> {
    let item = store.put(user, key, request.value)?;
    tracing::debug!(user, key, bytes = item.value.len(), "Stored item");
    Ok(ItemResponse {
        key: key.to_string(),
        value: item.value,
        updated_at: item.updated_at,
    })
}

pub fn handle_delete(store: &KvStore, user: &str, key: &str) -> Result<()> {
    if store.remove(user, key)? {
        Ok(())
    } else {
        Err(AppError::NotFound(key.to_string()))
    }
}

pub fn handle_batch_get(store: &KvStore, user: &str, request: KeysRequest) -> Result<BatchGetResponse> {
    let values = store.get_many(user, &request.keys)?;
    Ok(BatchGetResponse { values })
}

pub fn handle_batch_remove(
    store: &KvStore,
    user: &str,
    request: KeysRequest,
) -> Result<BatchRemoveResponse> {
    let removed = store.remove_many(user, &request.keys)?;
    tracing::debug!(user, requested = request.keys.len(), removed, "Removed items");
    Ok(BatchRemoveResponse { removed })
}
