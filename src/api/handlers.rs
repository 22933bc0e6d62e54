//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{CacheConfig, CacheEngine};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, HomeResponse, KeyRequest, SetRequest,
    SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The engine does its own sharded locking, so handlers share it through a
/// plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache engine
    pub cache: Arc<CacheEngine>,
}

impl AppState {
    /// Creates a new AppState around an existing engine.
    pub fn new(cache: CacheEngine) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState with an engine built from `config`.
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        Ok(Self::new(CacheEngine::new(config)?))
    }
}

/// Handler for GET /
pub async fn home_handler() -> Json<HomeResponse> {
    Json(HomeResponse::working())
}

/// Handler for PUT /set and POST /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.map(std::time::Duration::from_secs);
    state.cache.set(req.key.clone(), req.value, ttl)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for POST /set/:key/:value
///
/// Path-style write using the default TTL.
pub async fn set_path_handler(
    State(state): State<AppState>,
    Path((key, value)): Path<(String, String)>,
) -> Result<Json<SetResponse>> {
    state.cache.set(key.clone(), value, None)?;

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    lookup(&state.cache, key).map(Json)
}

/// Handler for POST /get
///
/// Same as GET /get/:key with the key in a JSON body.
pub async fn get_json_handler(
    State(state): State<AppState>,
    Json(req): Json<KeyRequest>,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    lookup(&state.cache, req.key).map(Json)
}

/// Reads the value and its remaining TTL from one entry snapshot.
///
/// The TTL is reported in whole seconds, rounded up so a live key never
/// shows 0.
fn lookup(cache: &CacheEngine, key: String) -> Result<GetResponse> {
    let (value, ttl) = cache
        .get_with_ttl(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
    let ttl = ttl.map(|ttl| ttl.as_millis().div_ceil(1000) as u64);

    Ok(GetResponse::new(key, &*value, ttl))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.delete(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
