//! kvcache - A sharded in-memory key/value cache server
//!
//! Provides Redis-like get/set/delete with TTL expiration, LRU eviction and
//! per-shard locking, behind a small HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheConfig, CacheEngine};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
