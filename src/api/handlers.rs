//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::cache::TableCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    GetResponse, HealthResponse, KeysQuery, KeysRequest, KeysResponse, MessageResponse,
    MgetResponse, MsetRequest, SetRequest, StatsResponse, TouchRequest, TtlResponse,
};
use crate::provider::MemoryTable;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache over the table, storing JSON values
    pub cache: Arc<TableCache<Value>>,
    /// The backing table, shared with the TTL sweep task
    pub table: Arc<MemoryTable>,
}

impl AppState {
    /// Creates a new AppState serving `cache`, which must be backed by `table`.
    pub fn new(cache: TableCache<Value>, table: Arc<MemoryTable>) -> Self {
        Self {
            cache: Arc::new(cache),
            table,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds an in-memory table laid out as the store configuration describes.
    pub fn from_config(config: &Config) -> Self {
        let table = Arc::new(MemoryTable::for_config(&config.store));
        let cache = TableCache::new(table.clone(), config.store.clone());
        Self::new(cache, table)
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<MessageResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set(&req.key, &req.value, req.ttl).await?;
    Ok(Json(MessageResponse::new(format!("Key '{}' set successfully", req.key), 1)))
}

/// Handler for GET /get/:key
///
/// Responds 404 when the key is absent or expired.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.cache.del(&key).await?;
    Ok(Json(MessageResponse::new(format!("Key '{}' deleted successfully", key), 1)))
}

/// Handler for POST /mget
pub async fn mget_handler(
    State(state): State<AppState>,
    Json(req): Json<KeysRequest>,
) -> Result<Json<MgetResponse>> {
    let values = state.cache.mget(&req.keys).await?;
    Ok(Json(MgetResponse { values }))
}

/// Handler for PUT /mset
pub async fn mset_handler(
    State(state): State<AppState>,
    Json(req): Json<MsetRequest>,
) -> Result<Json<MessageResponse>> {
    state.cache.mset(&req.entries, req.ttl).await?;
    Ok(Json(MessageResponse::new("Entries set successfully", req.entries.len())))
}

/// Handler for POST /mdel
pub async fn mdel_handler(
    State(state): State<AppState>,
    Json(req): Json<KeysRequest>,
) -> Result<Json<MessageResponse>> {
    state.cache.mdel(&req.keys).await?;
    Ok(Json(MessageResponse::new("Keys deleted successfully", req.keys.len())))
}

/// Handler for GET /keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<KeysResponse>> {
    let keys = state.cache.keys(query.pattern.as_deref()).await?;
    Ok(Json(KeysResponse { keys }))
}

/// Handler for GET /ttl/:key
pub async fn ttl_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TtlResponse>> {
    let ttl = state.cache.ttl(&key).await?;
    Ok(Json(TtlResponse { key, ttl }))
}

/// Handler for POST /touch
pub async fn touch_handler(
    State(state): State<AppState>,
    Json(req): Json<TouchRequest>,
) -> Result<Json<MessageResponse>> {
    state.cache.touch(&req.key, req.ttl).await?;
    Ok(Json(MessageResponse::new(format!("Key '{}' touched", req.key), 1)))
}

/// Handler for POST /reset
pub async fn reset_handler(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    state.cache.reset().await?;
    Ok(Json(MessageResponse::new("Cache reset", 0)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    Json(StatsResponse::new(&stats, state.table.len().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
