//! Redis storage backend.
//!
//! The production backing store: values and metadata as plain strings with
//! millisecond TTLs, namespace indexes as Redis SETs (O(1) membership,
//! cheap bulk reads), counters via atomic `INCR` with a windowed expiry.
//!
//! All keys are stored under a configurable prefix so the engine can share
//! a Redis instance with other applications:
//!
//! ```text
//! lce:chat:42            value
//! lce:meta:chat:42       metadata JSON (same TTL as the value)
//! lce:ns:docs            SET of keys in namespace "docs"
//! lce:freq:<hash>        admission counter
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client};
use std::time::Duration;

use super::traits::{CacheStore, StorageError};
use crate::resilience::retry::{retry, RetryConfig};

pub struct RedisStore {
    connection: ConnectionManager,
    /// Key prefix for namespacing (e.g., "lce:" → "lce:chat:42")
    prefix: String,
}

impl RedisStore {
    /// Connect without a key prefix.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::with_prefix(connection_string, None).await
    }

    /// Connect with an optional key prefix.
    ///
    /// Uses the startup retry config: fast-fail after a few seconds rather
    /// than hanging on a bad connection string.
    pub async fn with_prefix(
        connection_string: &str,
        prefix: Option<&str>,
    ) -> Result<Self, StorageError> {
        let client = Client::open(connection_string)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    /// Apply the prefix to a key.
    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Strip the prefix from a key (for returning clean IDs from scans).
    #[inline]
    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            key
        } else {
            key.strip_prefix(&self.prefix).unwrap_or(key)
        }
    }

    /// Get the configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);

        retry("redis_get", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let key = prefixed.clone();
            async move {
                let value: Option<String> = conn.get(&key).await?;
                Ok(value)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StorageError> {
        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);
        let value = value.to_string();

        retry("redis_set", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let key = prefixed.clone();
            let value = value.clone();
            async move {
                match ttl {
                    Some(ttl) => {
                        // SET key value PX <ms>
                        let _: () = cmd("SET")
                            .arg(&key)
                            .arg(&value)
                            .arg("PX")
                            .arg(ttl.as_millis() as u64)
                            .query_async(&mut conn)
                            .await?;
                    }
                    None => {
                        let _: () = conn.set(&key, &value).await?;
                    }
                }
                Ok(())
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);

        let removed: u64 = retry("redis_delete", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let key = prefixed.clone();
            async move {
                let removed: u64 = conn.del(&key).await?;
                Ok(removed)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        Ok(removed > 0)
    }

    /// Single multi-key DEL: one round trip for the whole batch.
    async fn delete_batch(&self, keys: &[String]) -> Result<u64, StorageError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let conn = self.connection.clone();
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed_key(k)).collect();

        retry("redis_delete_batch", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let keys = prefixed.clone();
            async move {
                let removed: u64 = conn.del(&keys).await?;
                Ok(removed)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);

        retry("redis_expire", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let key = prefixed.clone();
            async move {
                let armed: bool = cmd("PEXPIRE")
                    .arg(&key)
                    .arg(ttl.as_millis() as u64)
                    .query_async(&mut conn)
                    .await?;
                Ok(armed)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    /// Cursor-driven SCAN MATCH over the whole keyspace. Unbounded cost;
    /// callers treat this as an administrative operation.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.connection.clone();
        let prefixed_pattern = self.prefixed_key(pattern);

        let raw: Vec<String> = retry("redis_scan", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let pattern = prefixed_pattern.clone();
            async move {
                let mut keys = Vec::new();
                let mut cursor: u64 = 0;
                loop {
                    let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(500)
                        .query_async(&mut conn)
                        .await?;
                    keys.extend(batch);
                    cursor = next;
                    if cursor == 0 {
                        break;
                    }
                }
                Ok(keys)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        let mut keys: Vec<String> = raw
            .iter()
            .map(|k| self.strip_prefix(k).to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn index_add(&self, index: &str, member: &str) -> Result<(), StorageError> {
        let conn = self.connection.clone();
        let index = self.prefixed_key(index);
        let member = member.to_string();

        retry("redis_index_add", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let index = index.clone();
            let member = member.clone();
            async move {
                let _: u64 = conn.sadd(&index, &member).await?;
                Ok(())
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<bool, StorageError> {
        let conn = self.connection.clone();
        let index = self.prefixed_key(index);
        let member = member.to_string();

        let removed: u64 = retry("redis_index_remove", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let index = index.clone();
            let member = member.clone();
            async move {
                let removed: u64 = conn.srem(&index, &member).await?;
                Ok(removed)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        Ok(removed > 0)
    }

    async fn index_members(&self, index: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.connection.clone();
        let index = self.prefixed_key(index);

        let mut members: Vec<String> = retry("redis_index_members", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let index = index.clone();
            async move {
                let members: Vec<String> = conn.smembers(&index).await?;
                Ok(members)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        members.sort();
        Ok(members)
    }

    /// Server-side atomic INCR; the expiry window is armed on first touch
    /// only, so concurrent increments are never lost (no read-modify-write).
    async fn counter_increment(&self, key: &str, ttl: Duration) -> Result<u64, StorageError> {
        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);

        retry("redis_counter_incr", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let key = prefixed.clone();
            async move {
                let count: u64 = conn.incr(&key, 1u64).await?;
                if count == 1 {
                    let _: bool = cmd("PEXPIRE")
                        .arg(&key)
                        .arg(ttl.as_millis() as u64)
                        .query_async(&mut conn)
                        .await?;
                }
                Ok(count)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }
}
