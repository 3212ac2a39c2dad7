use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{wildcard_match, CacheStore, StorageError};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Debug, Clone)]
struct StoredCounter {
    value: u64,
    expires_at: Instant,
}

/// In-memory store with lazy expiry.
///
/// The default backend for tests and single-process deployments. Expired
/// entries are dropped on the read/scan that observes them, mirroring how
/// a networked store's own expiry would make them vanish.
pub struct MemoryStore {
    data: DashMap<String, StoredValue>,
    indexes: DashMap<String, HashSet<String>>,
    counters: DashMap<String, StoredCounter>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            indexes: DashMap::new(),
            counters: DashMap::new(),
        }
    }

    /// Count of live (unexpired) values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.value().is_expired()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all values, indexes, and counters.
    pub fn clear(&self) {
        self.data.clear();
        self.indexes.clear();
        self.counters.clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(entry) = self.data.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.data.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StorageError> {
        self.data.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        match self.data.remove(key) {
            Some((_, v)) => Ok(!v.is_expired()),
            None => Ok(false),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        match self.data.get_mut(key) {
            Some(mut entry) => {
                if entry.is_expired() {
                    drop(entry);
                    self.data.remove(key);
                    return Ok(false);
                }
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|e| !e.value().is_expired() && wildcard_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn index_add(&self, index: &str, member: &str) -> Result<(), StorageError> {
        self.indexes
            .entry(index.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<bool, StorageError> {
        match self.indexes.get_mut(index) {
            Some(mut set) => Ok(set.remove(member)),
            None => Ok(false),
        }
    }

    async fn index_members(&self, index: &str) -> Result<Vec<String>, StorageError> {
        let mut members: Vec<String> = self
            .indexes
            .get(index)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    async fn counter_increment(&self, key: &str, ttl: Duration) -> Result<u64, StorageError> {
        let mut entry = self.counters.entry(key.to_string()).or_insert_with(|| StoredCounter {
            value: 0,
            expires_at: Instant::now() + ttl,
        });
        if Instant::now() >= entry.expires_at {
            // Window elapsed: restart the count
            entry.value = 0;
            entry.expires_at = Instant::now() + ttl;
        }
        entry.value += 1;
        Ok(entry.value)
    }
}
