//! Cache system for Redis-backed caching
//!
//! This crate provides a thin cache facade over a key-value client,
//! with value encoding, default expirations, read-only mode and error logging.

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod client;
pub mod codec;
pub mod errors;
pub mod facade;
pub mod memory;
pub mod params;
pub mod prelude;
pub mod signal;

// Re-export centralized config
pub use config::{CacheConfig, ConnectionParams, ConnectionSource};

pub use client::{KvClient, RedisKvClient};
pub use codec::{CachedValue, Encoded};
pub use errors::CacheError;
pub use facade::{CacheFacade, FacadeState, Suppressed, WeakCacheFacade, WriteOutcome};
pub use memory::MemoryKvClient;
pub use params::{BatchWrite, MsetEntry};
