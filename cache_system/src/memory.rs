//! In-process key-value client
//!
//! Honors expirations and batch atomicity, so it stands in for Redis in tests
//! and in embedders that want a facade without a server.

use crate::client::KvClient;
use crate::errors::CacheError;
use crate::params::BatchWrite;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Key-value store held in a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryKvClient {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    closed: AtomicBool,
    failing: bool,
    calls: AtomicUsize,
}

impl MemoryKvClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose every command fails, for exercising error paths
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Number of commands received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        if self.failing {
            return Err(CacheError::General("memory client configured to fail".into()));
        }
        Ok(())
    }

    fn with_entries<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, MemoryEntry>, Instant) -> R,
    ) -> Result<R, CacheError> {
        self.check()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::General("memory store lock poisoned".into()))?;
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(f(&mut entries, now))
    }
}

fn expiring(value: &str, seconds: u64, now: Instant) -> Result<MemoryEntry, CacheError> {
    if seconds == 0 {
        return Err(CacheError::InvalidTtl(seconds));
    }
    let expires_at = now
        .checked_add(Duration::from_secs(seconds))
        .ok_or(CacheError::InvalidTtl(seconds))?;
    Ok(MemoryEntry {
        value: value.to_string(),
        expires_at: Some(expires_at),
    })
}

#[async_trait]
impl KvClient for MemoryKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_entries(|entries, _| entries.get(key).map(|e| e.value.clone()))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        self.with_entries(|entries, _| {
            keys.iter()
                .map(|key| entries.get(key).map(|e| e.value.clone()))
                .collect()
        })
    }

    async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError> {
        self.with_entries(|entries, now| {
            entries.insert(key.to_string(), expiring(value, seconds, now)?);
            Ok::<(), CacheError>(())
        })?
    }

    async fn set_ex_atomic(&self, writes: &[BatchWrite]) -> Result<Vec<String>, CacheError> {
        self.with_entries(|entries, now| {
            // Validate everything first so a bad write leaves the map untouched
            let staged = writes
                .iter()
                .map(|w| Ok::<_, CacheError>((w.key.clone(), expiring(&w.value, w.expiration, now)?)))
                .collect::<Result<Vec<_>, CacheError>>()?;
            let replies = staged.iter().map(|_| "OK".to_string()).collect();
            entries.extend(staged);
            Ok::<Vec<String>, CacheError>(replies)
        })?
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.with_entries(|entries, _| {
            keys.iter()
                .filter(|key| entries.remove(key.as_str()).is_some())
                .count() as u64
        })
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        self.with_entries(|entries, _| entries.clear())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError> {
        self.with_entries(|entries, now| {
            entries
                .get(key)
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(now).as_secs())
        })
    }

    async fn ping(&self) -> Result<String, CacheError> {
        self.check()?;
        Ok("PONG".to_string())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
