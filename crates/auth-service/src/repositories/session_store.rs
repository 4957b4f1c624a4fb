//! Key-value store backing the session registry.
//!
//! # Key Patterns
//!
//! - `subject:{id}:access` / `:refresh` / `:reset` - set of valid tokens
//! - `subject:{id}:otp` - set of valid one-time codes
//!
//! Only set operations and per-key expiry are needed, so the seam is small
//! enough to back with Redis in production and a `HashMap` in tests.
//!
//! Adding a member and starting the key's TTL happen in one atomic step, so
//! a set that lapses mid-request is recreated with a TTL rather than without.

use crate::observability::metrics::record_store_error;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store command {op} failed: {message}")]
    Command { op: &'static str, message: String },
}

/// Set-valued key-value store with per-key TTL.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Add `member` to the set at `key`, creating it if needed. If the key
    /// has no TTL afterwards (it was just created), its TTL is set to `ttl`.
    /// An existing TTL is never extended.
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Members of the set at `key`. Missing or expired keys yield an empty set.
    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Round-trip check used by the readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Lua script for adding a set member and starting the TTL of a fresh set.
///
/// Arguments:
/// - KEYS[1]: Set key (e.g., `subject:{id}:access`)
/// - ARGV[1]: Member to add
/// - ARGV[2]: TTL in seconds
///
/// `TTL` returns -1 for a key without expiry, which after the `SADD` means
/// the set did not exist before.
const SET_ADD_WITH_TTL: &str = r#"
redis.call('SADD', KEYS[1], ARGV[1])
if redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return 1
"#;

/// Redis-backed store.
///
/// Cheaply cloneable. `MultiplexedConnection` is cloned per command instead
/// of being shared behind a lock.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: MultiplexedConnection,
    set_add_script: Script,
}

impl RedisSessionStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            // The URL may embed a password, never log it.
            error!(target: "auth.store.redis", error = %e, "Failed to open Redis client");
            StoreError::Connection(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "auth.store.redis", error = %e, "Failed to connect to Redis");
                StoreError::Connection(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self {
            connection,
            set_add_script: Script::new(SET_ADD_WITH_TTL),
        })
    }

    fn command_error(op: &'static str, e: redis::RedisError) -> StoreError {
        warn!(target: "auth.store.redis", error = %e, op, "Redis command failed");
        record_store_error(op);
        StoreError::Command {
            op,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisSessionStore {
    #[instrument(skip_all, fields(ttl_secs = ttl.as_secs()))]
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        // EXPIRE rejects 0, and a zero TTL still has to end the set
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        let _: i64 = self
            .set_add_script
            .key(key)
            .arg(member)
            .arg(seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::command_error("set_add", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        let mut conn = self.connection.clone();
        conn.smembers(key)
            .await
            .map_err(|e| Self::command_error("set_members", e))
    }

    #[instrument(skip_all)]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| Self::command_error("delete", e))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::command_error("ping", e))?;
        Ok(())
    }
}

/// In-memory store for tests and local runs.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug, Default)]
    struct Entry {
        members: HashSet<String>,
        expires_at: Option<Instant>,
    }

    #[derive(Debug, Default)]
    struct Inner {
        entries: HashMap<String, Entry>,
        unavailable: bool,
    }

    impl Inner {
        /// Drop `key` if its TTL has elapsed, then check availability.
        fn prepare(&mut self, op: &'static str, key: &str) -> Result<(), StoreError> {
            if self.unavailable {
                return Err(StoreError::Command {
                    op,
                    message: "connection refused".to_string(),
                });
            }
            let expired = self
                .entries
                .get(key)
                .and_then(|e| e.expires_at)
                .is_some_and(|at| at <= Instant::now());
            if expired {
                self.entries.remove(key);
            }
            Ok(())
        }
    }

    /// `HashMap`-backed store. Expiry follows `tokio::time`, so tests can
    /// use `tokio::time::pause` and `advance`.
    #[derive(Debug, Clone, Default)]
    pub struct InMemorySessionStore {
        inner: Arc<Mutex<Inner>>,
    }

    impl InMemorySessionStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent call fail, or recover.
        pub async fn set_unavailable(&self, unavailable: bool) {
            self.inner.lock().await.unavailable = unavailable;
        }

        /// Remaining TTL of `key`, or `None` if missing or without expiry.
        pub async fn ttl(&self, key: &str) -> Option<Duration> {
            let inner = self.inner.lock().await;
            let expires_at = inner.entries.get(key)?.expires_at?;
            let now = Instant::now();
            (expires_at > now).then(|| expires_at - now)
        }

        /// Live keys, sorted.
        pub async fn keys(&self) -> Vec<String> {
            let inner = self.inner.lock().await;
            let now = Instant::now();
            let mut keys: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.expires_at.map_or(true, |at| at > now))
                .map(|(k, _)| k.clone())
                .collect();
            keys.sort();
            keys
        }
    }

    #[async_trait]
    impl KeyValueStore for InMemorySessionStore {
        async fn set_add(
            &self,
            key: &str,
            member: &str,
            ttl: Duration,
        ) -> Result<(), StoreError> {
            let mut inner = self.inner.lock().await;
            inner.prepare("set_add", key)?;
            let entry = inner.entries.entry(key.to_string()).or_default();
            entry.members.insert(member.to_string());
            if entry.expires_at.is_none() {
                entry.expires_at = Instant::now().checked_add(ttl);
            }
            Ok(())
        }

        async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
            let mut inner = self.inner.lock().await;
            inner.prepare("set_members", key)?;
            Ok(inner
                .entries
                .get(key)
                .map(|e| e.members.clone())
                .unwrap_or_default())
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            let mut inner = self.inner.lock().await;
            inner.prepare("delete", key)?;
            inner.entries.remove(key);
            Ok(())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            let inner = self.inner.lock().await;
            if inner.unavailable {
                return Err(StoreError::Connection("connection refused".to_string()));
            }
            Ok(())
        }
    }
}
