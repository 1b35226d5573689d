//! Core CacheHaus functionality
//!
//! This module contains the main CacheHaus struct and its implementation,
//! keeping named cache facades together and tearing them down on shutdown.

use cache_system::signal::termination_signal;
use cache_system::{CacheFacade, FacadeState, WeakCacheFacade};
use config::AppConfig;
use std::collections::HashMap;
use tokio::task::JoinHandle;

use crate::errors::CacheHausError;

/// Registry of named cache facades
#[derive(Debug, Clone, Default)]
pub struct CacheHaus {
    caches: HashMap<String, CacheFacade>,
}

impl CacheHaus {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one facade per configured cache
    ///
    /// Caches whose connection can't be set up are registered disabled.
    pub fn from_config(config: &AppConfig) -> Self {
        let caches = config
            .caches
            .iter()
            .map(|(name, cache_config)| (name.clone(), CacheFacade::new(cache_config.clone())))
            .collect();
        Self { caches }
    }

    /// Load configuration from the environment / default file and build the registry
    pub fn load() -> Result<Self, CacheHausError> {
        let config = AppConfig::load()?;
        Ok(Self::from_config(&config))
    }

    /// Register a cache facade with a given name
    pub fn register_cache(&mut self, name: String, cache: CacheFacade) -> Result<(), CacheHausError> {
        if self.caches.contains_key(&name) {
            return Err(CacheHausError::CacheAlreadyRegistered(name));
        }

        self.caches.insert(name, cache);
        Ok(())
    }

    /// Get a registered cache by name
    pub fn get_cache(&self, name: &str) -> Result<&CacheFacade, CacheHausError> {
        self.caches
            .get(name)
            .ok_or_else(|| CacheHausError::CacheNotFound(name.to_string()))
    }

    /// List all registered cache names
    pub fn list_caches(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self.caches.keys().collect();
        names.sort();
        names
    }

    /// Remove a cache by name, returning it
    pub fn unregister_cache(&mut self, name: &str) -> Result<CacheFacade, CacheHausError> {
        self.caches
            .remove(name)
            .ok_or_else(|| CacheHausError::CacheNotFound(name.to_string()))
    }

    /// Ping every active cache; disabled caches are skipped
    pub async fn health_check(&self) -> Result<(), CacheHausError> {
        for (name, cache) in &self.caches {
            if cache.state() == FacadeState::Disabled {
                continue;
            }
            cache
                .ping()
                .await
                .map_err(|source| CacheHausError::Cache {
                    name: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Close every cache connection
    pub async fn close_all(&self) {
        for cache in self.caches.values() {
            cache.close().await;
        }
    }

    /// Close every cache and exit when the process receives a termination signal
    ///
    /// Takes over Ctrl-C and SIGTERM for the process and exits with 130 or
    /// 143 once the caches registered at call time are closed. Caches dropped
    /// in the meantime are skipped.
    ///
    /// Returns `None` when called outside a Tokio runtime.
    pub fn install_shutdown_hook(&self) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let caches: Vec<WeakCacheFacade> = self.caches.values().map(CacheFacade::downgrade).collect();
        Some(handle.spawn(async move {
            let signal = termination_signal().await;
            tracing::info!(?signal, "Termination signal received, closing {} caches", caches.len());
            for cache in &caches {
                cache.close().await;
            }
            std::process::exit(signal.exit_code());
        }))
    }
}
