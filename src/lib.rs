//! # CacheHaus
//!
//! A thin cache facade over Redis: get/set/delete/flush with value encoding,
//! default expirations, read-only mode and atomic batch writes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cachehaus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::from_url("redis://127.0.0.1:6379")
//!         .with_default_expiration(300)
//!         .with_verbose(true);
//!
//!     // Never fails; without a usable connection the facade is disabled
//!     let cache = CacheFacade::new(config);
//!
//!     cache.set("greeting", "hello", None).await;
//!     cache.set("user:1", &json!({"name": "Ada"}), Some(60)).await;
//!
//!     cache
//!         .mset(
//!             [
//!                 ("a", MsetEntry::plain(1)),
//!                 ("b", MsetEntry::expiring("short lived", 30)),
//!             ],
//!             None,
//!         )
//!         .await;
//!
//!     let values = cache.mget(&["a", "b", "missing"]).await?;
//!     println!("found {} values", values.len());
//!
//!     if let Some(user) = cache.get("user:1").await? {
//!         println!("user: {}", user.into_value());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::CacheHaus;
pub use crate::errors::CacheHausError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, ConnectionParams, ConnectionSource};

// Re-export internal crates used in the public API
pub use cache_system;
pub use config;

// Re-export external dependencies used in public API
pub use async_trait;
pub use redis;
