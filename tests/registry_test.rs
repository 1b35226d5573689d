//! Integration tests for the named cache registry

use cachehaus::prelude::*;
use std::sync::Arc;

fn memory_cache() -> CacheFacade {
    CacheFacade::with_client(CacheConfig::default(), Arc::new(MemoryKvClient::new()))
}

#[test]
fn register_and_lookup() {
    let mut registry = CacheHaus::new();
    registry
        .register_cache("sessions".to_string(), memory_cache())
        .unwrap();
    registry
        .register_cache("pages".to_string(), memory_cache())
        .unwrap();

    assert!(matches!(
        registry.register_cache("pages".to_string(), memory_cache()),
        Err(CacheHausError::CacheAlreadyRegistered(name)) if name == "pages"
    ));
    assert_eq!(registry.list_caches(), vec!["pages", "sessions"]);
    assert!(registry.get_cache("sessions").unwrap().is_active());
    assert!(matches!(
        registry.get_cache("nope"),
        Err(CacheHausError::CacheNotFound(_))
    ));

    registry.unregister_cache("pages").unwrap();
    assert_eq!(registry.list_caches(), vec!["sessions"]);
}

#[test]
fn from_config_builds_every_cache() {
    let config = AppConfig::from_toml_str(
        r#"
        [caches.remote]
        url = "redis://127.0.0.1:6379"
        default_expiration = 60

        [caches.unconfigured]
        verbose = true
        "#,
    )
    .unwrap();

    let registry = CacheHaus::from_config(&config);
    let remote = registry.get_cache("remote").unwrap();
    assert!(remote.is_active());
    assert_eq!(remote.config().default_expiration, 60);
    assert_eq!(
        registry.get_cache("unconfigured").unwrap().state(),
        FacadeState::Disabled
    );
}

#[tokio::test]
async fn health_check_and_close_all() {
    let mut registry = CacheHaus::new();
    registry
        .register_cache("memory".to_string(), memory_cache())
        .unwrap();
    registry
        .register_cache(
            "disabled".to_string(),
            CacheFacade::disabled(CacheConfig::default()),
        )
        .unwrap();
    registry.health_check().await.unwrap();

    let failing = CacheFacade::with_client(
        CacheConfig::default(),
        Arc::new(MemoryKvClient::failing()),
    );
    registry.register_cache("failing".to_string(), failing).unwrap();
    assert!(matches!(
        registry.health_check().await,
        Err(CacheHausError::Cache { name, .. }) if name == "failing"
    ));

    registry.close_all().await;
    assert!(!registry.get_cache("memory").unwrap().is_active());
    registry.health_check().await.unwrap();
}

#[tokio::test]
async fn shutdown_hook_is_spawned() {
    let registry = CacheHaus::new();
    let hook = registry
        .install_shutdown_hook()
        .expect("runtime is available");
    assert!(!hook.is_finished());
    hook.abort();
}

#[tokio::test]
async fn shutdown_hook_releases_unregistered_caches() {
    let client = Arc::new(MemoryKvClient::new());
    let mut registry = CacheHaus::new();
    registry
        .register_cache(
            "sessions".to_string(),
            CacheFacade::with_client(CacheConfig::default(), client.clone()),
        )
        .unwrap();

    let hook = registry
        .install_shutdown_hook()
        .expect("runtime is available");
    drop(registry.unregister_cache("sessions").unwrap());
    assert_eq!(Arc::strong_count(&client), 1);
    hook.abort();
}
