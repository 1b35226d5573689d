//! Cache facade implementation
//!
//! This module provides the main CacheFacade struct: a small get/set/delete/flush
//! surface over a [`KvClient`], with value encoding, default expirations and
//! read-only suppression.
//!
//! Reads surface lookup failures to the caller. Writes never do: a failed write
//! is logged and reported through [`WriteOutcome`], which callers are free to
//! ignore.

use crate::client::{KvClient, RedisKvClient};
use crate::codec::{self, CachedValue};
use crate::errors::CacheError;
use crate::params::{BatchWrite, MsetEntry};
use crate::signal::termination_signal;
use config::CacheConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Whether the facade has a usable connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeState {
    Active,
    Disabled,
}

/// Why a write was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppressed {
    ReadOnly,
    Disabled,
}

/// Outcome of a write operation
///
/// Failures have already been logged by the time this is returned.
#[derive(Debug)]
pub enum WriteOutcome<T> {
    Applied(T),
    Suppressed(Suppressed),
    Failed(CacheError),
}

impl<T> WriteOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            WriteOutcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into a `Result`, treating suppression as an error
    pub fn into_result(self) -> Result<T, CacheError> {
        match self {
            WriteOutcome::Applied(value) => Ok(value),
            WriteOutcome::Suppressed(Suppressed::Disabled) => Err(CacheError::Disabled),
            WriteOutcome::Suppressed(Suppressed::ReadOnly) => {
                Err(CacheError::General("cache is read-only".into()))
            }
            WriteOutcome::Failed(error) => Err(error),
        }
    }
}

/// Uniform cache interface over a key-value client
#[derive(Clone)]
pub struct CacheFacade {
    config: Arc<CacheConfig>,
    client: Option<Arc<dyn KvClient>>,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for CacheFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheFacade")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("client", &self.client)
            .finish()
    }
}

impl CacheFacade {
    /// Create a facade from configuration
    ///
    /// Never fails. A missing or unusable connection source leaves the facade
    /// disabled. No signal handling is set up; see [`install_shutdown_hook`].
    ///
    /// [`install_shutdown_hook`]: CacheFacade::install_shutdown_hook
    pub fn new(config: CacheConfig) -> Self {
        if let Err(e) = config.validate() {
            tracing::error!(kind = %config.kind, "Invalid cache configuration, cache disabled: {}", e);
            return Self::disabled(config);
        }

        let Some(source) = config.source() else {
            tracing::warn!(kind = %config.kind, "No connection source configured, cache disabled");
            return Self::disabled(config);
        };

        let client = source.resolve().map_err(CacheError::from).and_then(|url| {
            RedisKvClient::open(&url, Duration::from_millis(config.connect_timeout_ms))
        });

        match client {
            Ok(client) => Self::active(config, Arc::new(client)),
            Err(e) => {
                tracing::error!(kind = %config.kind, "Failed to set up cache connection, cache disabled: {}", e);
                Self::disabled(config)
            }
        }
    }

    /// Create a facade around an already built client
    pub fn with_client(config: CacheConfig, client: Arc<dyn KvClient>) -> Self {
        if let Err(e) = config.validate() {
            tracing::error!(kind = %config.kind, "Invalid cache configuration, cache disabled: {}", e);
            return Self::disabled(config);
        }
        Self::active(config, client)
    }

    /// Create a facade with no connection; every operation is a no-op
    pub fn disabled(config: CacheConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn active(config: CacheConfig, client: Arc<dyn KvClient>) -> Self {
        if config.verbose {
            tracing::info!(
                kind = %config.kind,
                provider = client.provider_name(),
                read_only = config.read_only,
                "Cache facade active"
            );
        }
        Self {
            config: Arc::new(config),
            client: Some(client),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> FacadeState {
        if self.active_client().is_some() {
            FacadeState::Active
        } else {
            FacadeState::Disabled
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == FacadeState::Active
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Reserved flag; accepted in configuration but not consumed by any operation
    pub fn check_on_previous_empty(&self) -> bool {
        self.config.check_on_previous_empty
    }

    /// Get current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn active_client(&self) -> Option<&Arc<dyn KvClient>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.client.as_ref()
    }

    fn writable_client(&self) -> Result<&Arc<dyn KvClient>, Suppressed> {
        if self.config.read_only {
            return Err(Suppressed::ReadOnly);
        }
        self.active_client().ok_or(Suppressed::Disabled)
    }

    fn verbose(&self, message: fmt::Arguments<'_>) {
        if self.config.verbose {
            tracing::info!(kind = %self.config.kind, "{}", message);
        }
    }

    fn suppressed<T>(&self, operation: &str, reason: Suppressed) -> WriteOutcome<T> {
        self.verbose(format_args!("{} skipped: {:?}", operation, reason));
        WriteOutcome::Suppressed(reason)
    }

    fn finish_write<T>(
        &self,
        operation: &str,
        subject: &str,
        result: Result<T, CacheError>,
    ) -> WriteOutcome<T> {
        match result {
            Ok(value) => {
                self.verbose(format_args!("{} {} done", operation, subject));
                WriteOutcome::Applied(value)
            }
            Err(e) => {
                tracing::error!(kind = %self.config.kind, operation, subject, "Cache write failed: {}", e);
                WriteOutcome::Failed(e)
            }
        }
    }

    /// Get a single value
    pub async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
        self.get_with_clean_key(key, None).await
    }

    /// Get a single value, looking it up under `clean_key` when given
    ///
    /// `key` is what gets logged and reported; `clean_key` is what the store sees.
    pub async fn get_with_clean_key(
        &self,
        key: &str,
        clean_key: Option<&str>,
    ) -> Result<Option<CachedValue>, CacheError> {
        let Some(client) = self.active_client() else {
            return Ok(None);
        };
        let lookup = clean_key.unwrap_or(key);

        match client.get(lookup).await {
            Ok(Some(raw)) => {
                self.verbose(format_args!("get {} hit", key));
                Ok(Some(codec::decode(raw)))
            }
            Ok(None) => {
                self.verbose(format_args!("get {} miss", key));
                Ok(None)
            }
            Err(e) => {
                tracing::error!(kind = %self.config.kind, key, "Cache get failed: {}", e);
                Err(CacheError::get(key, e))
            }
        }
    }

    /// Get several values in one round trip
    ///
    /// Keys without a stored value are left out of the returned map.
    pub async fn mget<K: AsRef<str>>(
        &self,
        keys: &[K],
    ) -> Result<HashMap<String, CachedValue>, CacheError> {
        let Some(client) = self.active_client() else {
            return Ok(HashMap::new());
        };
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let requested = keys.len();
        match client.mget(&keys).await {
            Ok(values) => {
                let found: HashMap<String, CachedValue> = keys
                    .into_iter()
                    .zip(values)
                    .filter_map(|(key, value)| value.map(|raw| (key, codec::decode(raw))))
                    .collect();
                self.verbose(format_args!("mget {} keys, {} found", requested, found.len()));
                Ok(found)
            }
            Err(e) => {
                let joined = keys.join(",");
                tracing::error!(kind = %self.config.kind, keys = %joined, "Cache mget failed: {}", e);
                Err(CacheError::get(joined, e))
            }
        }
    }

    /// [`mget`](Self::mget) carrying a caller-chosen index through unchanged
    pub async fn mget_indexed<K: AsRef<str>, I>(
        &self,
        keys: &[K],
        index: I,
    ) -> (Result<HashMap<String, CachedValue>, CacheError>, I) {
        (self.mget(keys).await, index)
    }

    /// Store a value; strings are stored verbatim, anything else as JSON
    ///
    /// `expiration` defaults to the configured default (in seconds).
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiration: Option<u64>,
    ) -> WriteOutcome<()> {
        let client = match self.writable_client() {
            Ok(client) => client,
            Err(reason) => return self.suppressed("set", reason),
        };
        let expiration = expiration.unwrap_or(self.config.default_expiration);

        let encoded = if expiration == 0 {
            Err(CacheError::InvalidTtl(expiration))
        } else {
            codec::encode(value)
        };
        let result = match encoded {
            Ok(encoded) => client.set_ex(key, encoded.as_str(), expiration).await,
            Err(e) => Err(e),
        };
        self.finish_write("set", key, result)
    }

    /// Store several values in one atomic batch
    ///
    /// Each entry's expiration is its own override, else `expiration`, else
    /// the configured default. Every value is JSON-encoded, strings included.
    pub async fn mset<I, K, V>(&self, entries: I, expiration: Option<u64>) -> WriteOutcome<Vec<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MsetEntry>,
    {
        let client = match self.writable_client() {
            Ok(client) => client,
            Err(reason) => return self.suppressed("mset", reason),
        };
        let fallback = expiration.unwrap_or(self.config.default_expiration);

        let writes = entries
            .into_iter()
            .map(|(key, entry)| {
                let key: String = key.into();
                let entry: MsetEntry = entry.into();
                let expiration = entry.expiration().unwrap_or(fallback);
                if expiration == 0 {
                    return Err(CacheError::InvalidTtl(expiration));
                }
                let payload = codec::encode_json(entry.value()).into_payload();
                Ok(BatchWrite::new(key, payload, expiration))
            })
            .collect::<Result<Vec<_>, CacheError>>();

        let subject = match &writes {
            Ok(writes) => format!("{} keys", writes.len()),
            Err(_) => "batch".to_string(),
        };
        let result = match writes {
            Ok(writes) if writes.is_empty() => Ok(Vec::new()),
            Ok(writes) => client.set_ex_atomic(&writes).await,
            Err(e) => Err(e),
        };
        self.finish_write("mset", &subject, result)
    }

    /// Delete keys, reporting how many existed
    pub async fn del<K: AsRef<str>>(&self, keys: &[K]) -> WriteOutcome<u64> {
        let client = match self.writable_client() {
            Ok(client) => client,
            Err(reason) => return self.suppressed("del", reason),
        };
        if keys.is_empty() {
            return WriteOutcome::Applied(0);
        }

        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let result = client.del(&keys).await;
        self.finish_write("del", &keys.join(","), result)
    }

    /// Drop every key in the underlying store, not just this facade's
    pub async fn flush(&self) -> WriteOutcome<()> {
        let client = match self.writable_client() {
            Ok(client) => client,
            Err(reason) => return self.suppressed("flush", reason),
        };
        let result = client.flush_all().await;
        self.finish_write("flush", "*", result)
    }

    /// Remaining time to live of a key in seconds
    pub async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError> {
        match self.active_client() {
            Some(client) => client.ttl(key).await,
            None => Ok(None),
        }
    }

    /// Ping the store to check connectivity
    pub async fn ping(&self) -> Result<String, CacheError> {
        let client = self.active_client().ok_or(CacheError::Disabled)?;
        client.ping().await
    }

    /// Close the connection; the facade is disabled afterwards
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(client) = &self.client {
            client.close().await;
            self.verbose(format_args!("connection closed"));
        }
    }

    /// A handle that can close this facade without keeping it alive
    pub fn downgrade(&self) -> WeakCacheFacade {
        WeakCacheFacade {
            kind: self.config.kind.clone(),
            client: self.client.as_ref().map(Arc::downgrade),
            closed: Arc::downgrade(&self.closed),
        }
    }

    /// Close the connection and exit when the process receives a termination signal
    ///
    /// Opt-in: installing the hook takes over Ctrl-C and SIGTERM for the whole
    /// process. Once the connection is closed the process exits with status
    /// 130 (Ctrl-C) or 143 (SIGTERM). The hook only holds a weak handle, so
    /// dropping the facade releases the connection as usual.
    ///
    /// Returns `None` outside a Tokio runtime or for a disabled facade.
    pub fn install_shutdown_hook(&self) -> Option<JoinHandle<()>> {
        self.active_client()?;
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let facade = self.downgrade();
        Some(handle.spawn(async move {
            let signal = termination_signal().await;
            tracing::info!(kind = %facade.kind, ?signal, "Termination signal received, closing cache connection");
            facade.close().await;
            std::process::exit(signal.exit_code());
        }))
    }
}

/// Non-owning handle to a [`CacheFacade`], see [`CacheFacade::downgrade`]
#[derive(Debug, Clone)]
pub struct WeakCacheFacade {
    kind: String,
    client: Option<Weak<dyn KvClient>>,
    closed: Weak<AtomicBool>,
}

impl WeakCacheFacade {
    /// Close the facade if it is still alive
    ///
    /// Returns `false` when every clone of the facade has been dropped.
    pub async fn close(&self) -> bool {
        let Some(closed) = self.closed.upgrade() else {
            return false;
        };
        if closed.swap(true, Ordering::AcqRel) {
            return true;
        }
        if let Some(client) = self.client.as_ref().and_then(Weak::upgrade) {
            client.close().await;
            debug_log!("{} cache connection closed", self.kind);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKvClient;
    use serde_json::json;

    fn facade_with(config: CacheConfig) -> (CacheFacade, Arc<MemoryKvClient>) {
        let client = Arc::new(MemoryKvClient::new());
        (CacheFacade::with_client(config, client.clone()), client)
    }

    fn assert_ttl(ttl: Option<u64>, expected: u64) {
        let ttl = ttl.expect("key should carry an expiration");
        assert!(ttl <= expected && ttl + 1 >= expected, "ttl {} vs {}", ttl, expected);
    }

    #[test]
    fn new_without_source_is_disabled() {
        let facade = CacheFacade::new(CacheConfig::default());
        assert_eq!(facade.state(), FacadeState::Disabled);
    }

    #[test]
    fn new_with_bad_url_is_disabled() {
        let facade = CacheFacade::new(CacheConfig::from_url("definitely not a url"));
        assert_eq!(facade.state(), FacadeState::Disabled);
    }

    #[test]
    fn new_with_missing_env_is_disabled() {
        let facade = CacheFacade::new(CacheConfig::from_env("CACHEHAUS_FACADE_TEST_UNSET"));
        assert!(!facade.is_active());
    }

    #[test]
    fn new_with_url_is_active_without_connecting() {
        let facade = CacheFacade::new(CacheConfig::from_url("redis://127.0.0.1:6379"));
        assert!(facade.is_active());
        // Outside a runtime no hook can be spawned
        assert!(facade.install_shutdown_hook().is_none());
    }

    #[tokio::test]
    async fn unrepresentable_expiration_fails_only_that_write() {
        let (facade, _) = facade_with(CacheConfig::default());

        assert!(matches!(
            facade.set("k", "v", Some(u64::MAX)).await,
            WriteOutcome::Failed(CacheError::InvalidTtl(u64::MAX))
        ));
        assert!(facade.set("other", "v", None).await.is_applied());
        assert_eq!(
            facade.get("other").await.unwrap(),
            Some(CachedValue::Raw("v".to_string()))
        );
    }

    #[test]
    fn invalid_config_disables_injected_client() {
        let (facade, _) = facade_with(CacheConfig::default().with_default_expiration(0));
        assert_eq!(facade.state(), FacadeState::Disabled);
    }

    #[tokio::test]
    async fn set_uses_default_or_given_expiration() {
        let (facade, client) = facade_with(CacheConfig::default().with_default_expiration(120));

        assert!(facade.set("default", "v", None).await.is_applied());
        assert!(facade.set("custom", &json!({"a": 1}), Some(45)).await.is_applied());

        assert_ttl(client.ttl("default").await.unwrap(), 120);
        assert_ttl(client.ttl("custom").await.unwrap(), 45);
        assert_eq!(client.get("custom").await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(client.get("default").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn mset_expiration_resolution_order() {
        let (facade, client) = facade_with(CacheConfig::default());

        let outcome = facade
            .mset(
                [
                    ("wrapped", MsetEntry::expiring("w", 30)),
                    ("plain", MsetEntry::plain("p")),
                ],
                Some(60),
            )
            .await;
        assert_eq!(outcome.applied().unwrap(), vec!["OK", "OK"]);
        assert_ttl(client.ttl("wrapped").await.unwrap(), 30);
        assert_ttl(client.ttl("plain").await.unwrap(), 60);

        facade.mset([("defaulted", json!(1))], None).await;
        assert_ttl(client.ttl("defaulted").await.unwrap(), 900);

        // mset always stores JSON, strings included
        assert_eq!(client.get("plain").await.unwrap().as_deref(), Some("\"p\""));
    }

    #[tokio::test]
    async fn mset_zero_expiration_fails_whole_batch() {
        let (facade, client) = facade_with(CacheConfig::default());

        let outcome = facade
            .mset(
                [("ok", MsetEntry::plain(1)), ("bad", MsetEntry::expiring(2, 0))],
                None,
            )
            .await;
        assert!(matches!(outcome, WriteOutcome::Failed(CacheError::InvalidTtl(0))));
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn empty_batches_skip_the_client() {
        let (facade, client) = facade_with(CacheConfig::default());

        let entries: Vec<(String, MsetEntry)> = Vec::new();
        assert!(facade.mset(entries, None).await.is_applied());
        assert_eq!(facade.del::<&str>(&[]).await.applied(), Some(0));
        assert!(facade.mget::<&str>(&[]).await.unwrap().is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn read_only_suppresses_every_write() {
        let (facade, client) = facade_with(CacheConfig::default().with_read_only(true));

        assert!(matches!(
            facade.set("k", "v", None).await,
            WriteOutcome::Suppressed(Suppressed::ReadOnly)
        ));
        assert!(matches!(
            facade.mset([("k", json!(1))], None).await,
            WriteOutcome::Suppressed(Suppressed::ReadOnly)
        ));
        assert!(matches!(
            facade.del(&["k"]).await,
            WriteOutcome::Suppressed(Suppressed::ReadOnly)
        ));
        assert!(matches!(
            facade.flush().await,
            WriteOutcome::Suppressed(Suppressed::ReadOnly)
        ));
        assert_eq!(client.call_count(), 0);
        assert_eq!(facade.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clean_key_is_used_for_lookup() {
        let (facade, _) = facade_with(CacheConfig::default());
        facade.set("user:42", &json!({"id": 42}), None).await;

        let value = facade
            .get_with_clean_key("[display] user 42", Some("user:42"))
            .await
            .unwrap();
        assert_eq!(value, Some(CachedValue::from(json!({"id": 42}))));
        assert_eq!(facade.get("[display] user 42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_failure_is_surfaced_write_failure_is_not() {
        let client = Arc::new(MemoryKvClient::failing());
        let facade = CacheFacade::with_client(CacheConfig::default(), client);

        let err = facade.get("k").await.unwrap_err();
        assert!(err.is_get());
        assert!(facade.mget(&["a", "b"]).await.unwrap_err().is_get());

        assert!(matches!(facade.set("k", "v", None).await, WriteOutcome::Failed(_)));
        assert!(matches!(facade.del(&["k"]).await, WriteOutcome::Failed(_)));
        assert!(matches!(facade.flush().await, WriteOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn mget_indexed_returns_index_unchanged() {
        let (facade, _) = facade_with(CacheConfig::default());
        facade.set("a", &1, None).await;

        let (result, index) = facade.mget_indexed(&["a", "b"], 7usize).await;
        assert_eq!(index, 7);
        let found = result.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["a"].as_json(), Some(&json!(1)));
    }

    #[tokio::test]
    async fn close_disables_the_facade() {
        let (facade, client) = facade_with(CacheConfig::default());
        facade.set("k", "v", None).await;

        facade.close().await;
        assert_eq!(facade.state(), FacadeState::Disabled);
        assert_eq!(facade.get("k").await.unwrap(), None);
        assert!(matches!(
            facade.set("k", "v", None).await,
            WriteOutcome::Suppressed(Suppressed::Disabled)
        ));
        assert!(matches!(facade.ping().await, Err(CacheError::Disabled)));
        assert!(matches!(client.get("k").await, Err(CacheError::Closed)));
    }

    #[tokio::test]
    async fn shutdown_hook_installed_inside_runtime() {
        let (facade, _) = facade_with(CacheConfig::default());
        let hook = facade.install_shutdown_hook().expect("runtime is available");
        assert!(!hook.is_finished());
        hook.abort();

        let disabled = CacheFacade::disabled(CacheConfig::default());
        assert!(disabled.install_shutdown_hook().is_none());
    }

    #[tokio::test]
    async fn shutdown_hook_does_not_keep_facade_alive() {
        let (facade, client) = facade_with(CacheConfig::default());
        let hook = facade.install_shutdown_hook().expect("runtime is available");
        assert_eq!(Arc::strong_count(&client), 2);

        drop(facade);
        assert_eq!(Arc::strong_count(&client), 1);
        assert!(!hook.is_finished());
        hook.abort();
    }

    #[tokio::test]
    async fn weak_close_reaches_live_facades_only() {
        let (facade, client) = facade_with(CacheConfig::default());
        let weak = facade.downgrade();

        assert!(weak.close().await);
        assert_eq!(facade.state(), FacadeState::Disabled);
        assert!(matches!(client.get("k").await, Err(CacheError::Closed)));

        drop(facade);
        assert!(!weak.close().await);
    }
}
