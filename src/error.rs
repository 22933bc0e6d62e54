//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine and its HTTP adapter.
///
/// Absent keys are not errors inside the engine (`get` returns `Option`,
/// `delete` returns `bool`); `NotFound` is only produced by the adapter.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Malformed request at the adapter boundary
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value exceeds the configured maximum size
    #[error("Value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    /// TTL that would expire an entry at or before its creation
    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),

    /// Eviction was requested on a store holding no entries
    #[error("Eviction requested on an empty store")]
    EmptyStore,

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_)
            | CacheError::InvalidKey(_)
            | CacheError::InvalidTtl(_) => StatusCode::BAD_REQUEST,
            CacheError::ValueTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::EmptyStore | CacheError::InvalidConfig(_) => {
                tracing::error!("Unexpected cache failure: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
