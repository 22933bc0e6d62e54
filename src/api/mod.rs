//! API Module
//!
//! HTTP handlers and routing for the cache server REST API. This is the thin
//! adapter over [`crate::cache::CacheEngine`]: it validates request bodies and
//! maps engine results to status codes.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
