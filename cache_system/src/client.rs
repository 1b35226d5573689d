//! Key-value client abstraction
//!
//! The facade talks to the store through [`KvClient`]. [`RedisKvClient`] is the
//! production implementation; tests and embedders can inject anything else.

use crate::errors::CacheError;
use crate::params::BatchWrite;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Capabilities the facade needs from the underlying store
#[async_trait]
pub trait KvClient: Send + Sync + Debug {
    /// Fetch the raw text stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Fetch several keys in one round trip, in request order
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    /// Store `value` under `key` for `seconds`
    async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError>;

    /// Apply every write as one atomic batch, returning one reply per write
    async fn set_ex_atomic(&self, writes: &[BatchWrite]) -> Result<Vec<String>, CacheError>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Drop every key in the store
    async fn flush_all(&self) -> Result<(), CacheError>;

    /// Remaining time to live; `None` when the key is missing or never expires
    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError>;

    async fn ping(&self) -> Result<String, CacheError>;

    /// Release the connection; later calls fail with [`CacheError::Closed`]
    async fn close(&self);

    /// Short name of the backing store, for logs
    fn provider_name(&self) -> &'static str;
}

/// Redis-backed client sharing one multiplexed connection
#[derive(Clone)]
pub struct RedisKvClient {
    client: Arc<Client>,
    connect_timeout: Duration,
    connection_pool: Arc<RwLock<Option<redis::aio::MultiplexedConnection>>>,
    closed: Arc<AtomicBool>,
}

impl Debug for RedisKvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connection_status = if self.closed.load(Ordering::Acquire) {
            "closed"
        } else {
            match self.connection_pool.try_read() {
                Ok(pool) => {
                    if pool.is_some() {
                        "connected"
                    } else {
                        "no_connection"
                    }
                }
                Err(_) => "lock_error",
            }
        };

        f.debug_struct("RedisKvClient")
            .field("connected", &connection_status)
            .finish()
    }
}

impl RedisKvClient {
    /// Parse `url` and prepare a client; the connection is opened on first use
    pub fn open(url: &str, connect_timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url)?;

        Ok(Self {
            client: Arc::new(client),
            connect_timeout,
            connection_pool: Arc::new(RwLock::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get or create Redis connection
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }

        let mut pool = self.connection_pool.write().await;

        if pool.is_none() {
            let connection = tokio::time::timeout(
                self.connect_timeout,
                self.client.get_multiplexed_async_connection(),
            )
            .await
            .map_err(|_| CacheError::Timeout)??;
            debug_log!("Opened redis connection");
            *pool = Some(connection);
        }

        Ok(pool
            .as_ref()
            .ok_or_else(|| CacheError::General("Failed to get connection from pool".into()))?
            .clone())
    }

    /// Connection error handler: log and hand the error back, the process carries on
    fn on_error(&self, operation: &str, error: CacheError) -> CacheError {
        tracing::debug!(operation, "redis error: {}", error);
        error
    }
}

fn reply_text(value: redis::Value) -> String {
    match value {
        redis::Value::Okay => "OK".to_string(),
        redis::Value::SimpleString(text) => text,
        redis::Value::BulkString(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        other => format!("{:?}", other),
    }
}

#[async_trait]
impl KvClient for RedisKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        trace_log!("GET {}", key);
        let result = async {
            let mut conn = self.get_connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok::<_, CacheError>(value)
        }
        .await;
        result.map_err(|e| self.on_error("get", e))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        trace_log!("MGET {:?}", keys);
        let result = async {
            let mut conn = self.get_connection().await?;
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(keys)
                .query_async(&mut conn)
                .await?;
            Ok::<_, CacheError>(values)
        }
        .await;
        result.map_err(|e| self.on_error("mget", e))
    }

    async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError> {
        trace_log!("SETEX {} {}", key, seconds);
        let result = async {
            let mut conn = self.get_connection().await?;
            let _: () = conn.set_ex(key, value, seconds).await?;
            Ok::<_, CacheError>(())
        }
        .await;
        result.map_err(|e| self.on_error("set", e))
    }

    async fn set_ex_atomic(&self, writes: &[BatchWrite]) -> Result<Vec<String>, CacheError> {
        trace_log!("MULTI with {} SETEX", writes.len());
        let result = async {
            let mut conn = self.get_connection().await?;
            let mut pipe = redis::pipe();
            pipe.atomic();
            for write in writes {
                pipe.set_ex(&write.key, &write.value, write.expiration);
            }
            let replies: Vec<redis::Value> = pipe.query_async(&mut conn).await?;
            Ok::<_, CacheError>(replies.into_iter().map(reply_text).collect())
        }
        .await;
        result.map_err(|e| self.on_error("mset", e))
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        trace_log!("DEL {:?}", keys);
        let result = async {
            let mut conn = self.get_connection().await?;
            let deleted: u64 = conn.del(keys).await?;
            Ok::<_, CacheError>(deleted)
        }
        .await;
        result.map_err(|e| self.on_error("del", e))
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        trace_log!("FLUSHALL");
        let result = async {
            let mut conn = self.get_connection().await?;
            let _: () = redis::cmd("FLUSHALL").query_async(&mut conn).await?;
            Ok::<_, CacheError>(())
        }
        .await;
        result.map_err(|e| self.on_error("flush", e))
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError> {
        let result = async {
            let mut conn = self.get_connection().await?;
            let ttl: i64 = conn.ttl(key).await?;
            Ok::<_, CacheError>(u64::try_from(ttl).ok())
        }
        .await;
        result.map_err(|e| self.on_error("ttl", e))
    }

    async fn ping(&self) -> Result<String, CacheError> {
        let result = async {
            let mut conn = self.get_connection().await?;
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, CacheError>(pong)
        }
        .await;
        result.map_err(|e| self.on_error("ping", e))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the last handle shuts the multiplexed driver down
        self.connection_pool.write().await.take();
        debug_log!("Closed redis connection");
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_malformed_url() {
        assert!(RedisKvClient::open("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn closed_client_refuses_commands() {
        let client = RedisKvClient::open("redis://127.0.0.1:6379", Duration::from_secs(1)).unwrap();
        client.close().await;

        assert!(matches!(client.get("k").await, Err(CacheError::Closed)));
        assert!(matches!(client.flush_all().await, Err(CacheError::Closed)));
    }

    #[test]
    fn reply_text_renders_status_replies() {
        assert_eq!(reply_text(redis::Value::Okay), "OK");
        assert_eq!(reply_text(redis::Value::SimpleString("QUEUED".into())), "QUEUED");
    }
}
