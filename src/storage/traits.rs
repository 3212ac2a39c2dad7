use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Key not found")]
    NotFound,
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// The backing key-value store seam.
///
/// The engine assumes single-key atomicity (`counter_increment` must be an
/// atomic server-side increment, not read-modify-write) but no multi-key
/// transactions. `scan` is the expensive path; index operations exist so
/// callers can avoid it wherever a namespace hint is available.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store a value. `ttl = None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StorageError>;

    /// Delete a key. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete many keys in one round trip (pipelined where the backend
    /// supports it). Returns the number of keys that existed.
    /// Default implementation falls back to sequential deletes.
    async fn delete_batch(&self, keys: &[String]) -> Result<u64, StorageError> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Re-arm a key's expiry without rewriting its value.
    /// Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError>;

    /// List keys matching a `*`-wildcard pattern.
    ///
    /// Unbounded cost: walks the whole keyspace. Reserved for
    /// administrative operations without a namespace hint.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StorageError>;

    /// Add a member to a set index. O(1).
    async fn index_add(&self, index: &str, member: &str) -> Result<(), StorageError>;

    /// Remove a member from a set index. Returns whether it was present.
    async fn index_remove(&self, index: &str, member: &str) -> Result<bool, StorageError>;

    /// All members of a set index.
    async fn index_members(&self, index: &str) -> Result<Vec<String>, StorageError>;

    /// Atomically increment a counter, arming `ttl` on first touch, and
    /// return the post-increment value. Concurrent increments must not be
    /// lost; this is the seam the store-backed admission counter relies on.
    async fn counter_increment(&self, key: &str, ttl: Duration) -> Result<u64, StorageError>;
}

/// Match a key against a `*`-wildcard pattern (no other metacharacters).
///
/// Shared by [`MemoryStore`](super::memory::MemoryStore) scans and by the
/// invalidator's conjunctive re-check; Redis evaluates the same glob
/// server-side via `SCAN MATCH`.
#[must_use]
pub fn wildcard_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        // No wildcard at all: exact match
        return pattern == key;
    }

    let last = parts.len() - 1;
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            match rest.strip_suffix(part) {
                Some(_) => rest = "",
                None => return false,
            }
        } else {
            // Leftmost occurrence leaves the most room for later parts
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}
