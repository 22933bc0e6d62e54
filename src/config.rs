//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{CacheConfig, Capacity, DEFAULT_SHARDS, MAX_VALUE_SIZE};
use crate::error::Result;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Byte budget; when set it replaces the entry-count bound
    pub max_bytes: Option<usize>,
    /// Largest accepted value in bytes
    pub max_value_size: usize,
    /// Default TTL in seconds for entries without explicit TTL (0 = none)
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background sweep interval in seconds (0 = lazy expiration only)
    pub sweep_interval: u64,
    /// Number of store shards
    pub shards: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `MAX_BYTES` - Byte budget, overrides `MAX_ENTRIES` when set
    /// - `MAX_VALUE_SIZE` - Maximum value size in bytes (default: 1 MB)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 disables (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds, 0 disables (default: 1)
    /// - `SHARDS` - Number of store shards (default: 16)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_bytes: parse_var("MAX_BYTES"),
            max_value_size: parse_var("MAX_VALUE_SIZE").unwrap_or(defaults.max_value_size),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            shards: parse_var("SHARDS").unwrap_or(defaults.shards),
        }
    }

    /// Builds the engine configuration.
    pub fn cache_config(&self) -> CacheConfig {
        let capacity = match self.max_bytes {
            Some(bytes) => Capacity::Bytes(bytes),
            None => Capacity::Entries(self.max_entries),
        };

        CacheConfig {
            capacity,
            max_value_size: self.max_value_size,
            default_ttl: non_zero_secs(self.default_ttl),
            sweep_interval: non_zero_secs(self.sweep_interval),
            shards: self.shards,
        }
    }

    /// Checks that the configuration can build a working engine.
    pub fn validate(&self) -> Result<()> {
        self.cache_config().validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_bytes: None,
            max_value_size: MAX_VALUE_SIZE,
            default_ttl: 300,
            server_port: 3000,
            sweep_interval: 1,
            shards: DEFAULT_SHARDS,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
