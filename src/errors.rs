//! Error types for the CacheHaus crate
//!
//! This module contains all error types that can be returned by CacheHaus operations.

use cache_system::CacheError;
use config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheHausError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache '{name}' error: {source}")]
    Cache {
        name: String,
        #[source]
        source: CacheError,
    },

    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    #[error("Cache already registered: {0}")]
    CacheAlreadyRegistered(String),
}
