//! Error types for cache operations
//!
//! This module defines all error types that can occur
//! during cache operations and Redis interactions.

use thiserror::Error;

/// Cache system errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    ConnectionError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Lookup failure surfaced to the caller of `get` / `mget`
    #[error("Get failed for key '{key}': {source}")]
    Get {
        key: String,
        #[source]
        source: Box<CacheError>,
    },

    #[error("Cache operation timeout")]
    Timeout,

    #[error("Invalid TTL value: {0}")]
    InvalidTtl(u64),

    #[error("Cache is disabled")]
    Disabled,

    #[error("Cache connection is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("General cache error: {0}")]
    General(String),
}

impl CacheError {
    /// Wrap a lookup failure for `key`
    pub fn get(key: impl Into<String>, source: CacheError) -> Self {
        CacheError::Get {
            key: key.into(),
            source: Box::new(source),
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, CacheError::Get { .. })
    }
}
