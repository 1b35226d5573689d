//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::client::{KvClient, RedisKvClient};
pub use crate::codec::CachedValue;
pub use crate::errors::CacheError;
pub use crate::facade::{CacheFacade, FacadeState, Suppressed, WeakCacheFacade, WriteOutcome};
pub use crate::memory::MemoryKvClient;
pub use crate::params::MsetEntry;

// Re-export centralized config
pub use config::{CacheConfig, ConnectionParams};

// Common external dependencies
pub use async_trait::async_trait;
pub use redis;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;
