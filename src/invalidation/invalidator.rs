// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{InvalidationRequest, InvalidationResult};
use crate::cache_meta::{epoch_ms, CacheMetadata};
use crate::freshness::{calculate_freshness, Freshness, FreshnessStatus};
use crate::keys;
use crate::metrics;
use crate::storage::traits::{wildcard_match, CacheStore, StorageError};

/// A stale or expired entry surfaced by [`CacheInvalidator::stale_caches`].
#[derive(Debug, Clone)]
pub struct StaleCache {
    pub key: String,
    pub metadata: CacheMetadata,
    pub status: FreshnessStatus,
}

/// Owns per-key metadata and namespace indexes; orchestrates bulk removal.
pub struct CacheInvalidator {
    store: Arc<dyn CacheStore>,
    avg_regeneration_cost: f64,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn CacheStore>, avg_regeneration_cost: f64) -> Self {
        Self {
            store,
            avg_regeneration_cost,
        }
    }

    /// Persist metadata for a newly cached entry. The metadata record gets
    /// the same lifetime as the value; namespaced keys join their index.
    pub async fn register_cache(
        &self,
        key: &str,
        metadata: &CacheMetadata,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(metadata)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        self.store
            .set(
                &keys::meta_key(key),
                &json,
                Some(Duration::from_millis(metadata.ttl_ms)),
            )
            .await?;

        if let Some(ref namespace) = metadata.namespace {
            self.store.index_add(&keys::ns_index(namespace), key).await?;
        }

        debug!(key, namespace = ?metadata.namespace, ttl_ms = metadata.ttl_ms, "Registered cache entry");
        Ok(())
    }

    /// Load an entry's metadata. Malformed records decode to `None` (and a
    /// warning), never an error: for invalidation they fall back to the
    /// deletion-by-pattern path, for freshness they are simply absent.
    pub async fn load_metadata(&self, key: &str) -> Result<Option<CacheMetadata>, StorageError> {
        match self.store.get(&keys::meta_key(key)).await? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(meta) => Ok(Some(meta)),
                Err(e) => {
                    warn!(key, error = %e, "Malformed cache metadata, treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Record a read: bump the access counter and re-persist the record
    /// with exactly its remaining lifetime. Being read must never extend
    /// or shrink an entry's expiry.
    ///
    /// Returns false when the entry has no (live) metadata. Increments may
    /// be lost under concurrent reads of a hot key; the counter is a
    /// freshness heuristic, not a billing-grade count.
    pub async fn record_access(&self, key: &str) -> Result<bool, StorageError> {
        let Some(mut meta) = self.load_metadata(key).await? else {
            return Ok(false);
        };

        let now = epoch_ms();
        let remaining = meta.ttl_remaining_ms(now);
        if remaining == 0 {
            // Already past expiry; re-persisting would resurrect it
            return Ok(false);
        }

        meta.record_access(now);
        let json = serde_json::to_string(&meta)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.store
            .set(&keys::meta_key(key), &json, Some(Duration::from_millis(remaining)))
            .await?;
        Ok(true)
    }

    /// Bulk invalidation. All provided criteria must hold (conjunctive);
    /// repeat invocations are idempotent and report zero.
    pub async fn invalidate(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationResult, StorageError> {
        if request.is_empty() {
            warn!("Invalidation request without criteria, refusing to match everything");
            return Ok(InvalidationResult::default());
        }

        let candidates = self.candidates(request).await?;
        let now = epoch_ms();

        let mut matched: Vec<(String, Option<String>)> = Vec::new();
        for key in candidates {
            match self.load_metadata(&key).await? {
                Some(meta) => {
                    if Self::matches(request, &key, &meta, now) {
                        matched.push((key, meta.namespace.clone()));
                    }
                }
                None => {
                    // Orphan policy: a metadata-less key is deleted when the
                    // request is pattern-only; namespace/age/url criteria
                    // cannot be shown to hold for it, so it is excluded.
                    let pattern_only = request.namespace.is_none()
                        && request.older_than_ms.is_none()
                        && request.url.is_none();
                    if pattern_only
                        && request
                            .pattern
                            .as_deref()
                            .is_some_and(|p| wildcard_match(p, &key))
                    {
                        matched.push((key, None));
                    }
                }
            }
        }

        if matched.is_empty() {
            debug!(?request, "Invalidation matched nothing");
            return Ok(InvalidationResult::default());
        }

        // Remove value + metadata in one pipelined batch, then drop index
        // memberships for the namespaced entries.
        let mut to_delete = Vec::with_capacity(matched.len() * 2);
        for (key, _) in &matched {
            to_delete.push(key.clone());
            to_delete.push(keys::meta_key(key));
        }
        self.store.delete_batch(&to_delete).await?;

        let mut namespaces: Vec<String> = Vec::new();
        for (key, namespace) in &matched {
            if let Some(ns) = namespace {
                self.store.index_remove(&keys::ns_index(ns), key).await?;
                if !namespaces.contains(ns) {
                    namespaces.push(ns.clone());
                }
            }
        }
        namespaces.sort();

        let cache_keys: Vec<String> = matched.into_iter().map(|(k, _)| k).collect();
        let invalidated = cache_keys.len() as u64;
        let estimated_cost_impact = invalidated as f64 * self.avg_regeneration_cost;
        let pre_warmed = if request.pre_warm { invalidated } else { 0 };

        metrics::record_invalidation(invalidated, estimated_cost_impact);
        info!(
            invalidated,
            namespaces = ?namespaces,
            reason = request.reason.as_deref().unwrap_or("-"),
            pre_warm = request.pre_warm,
            "Invalidated cache entries"
        );

        Ok(InvalidationResult {
            invalidated,
            namespaces,
            cache_keys,
            estimated_cost_impact,
            pre_warmed,
        })
    }

    /// Full metadata scan classifying every entry's freshness; returns
    /// those stale or expired. Unbounded latency: background sweeps only,
    /// never request-path code.
    pub async fn stale_caches(&self) -> Result<Vec<StaleCache>, StorageError> {
        let meta_keys = self.store.scan("meta:*").await?;
        let now = epoch_ms();

        let mut stale = Vec::new();
        for meta_key in meta_keys {
            let Some(key) = meta_key.strip_prefix("meta:") else {
                continue;
            };
            if let Some(metadata) = self.load_metadata(key).await? {
                let status = calculate_freshness(&metadata, now);
                if status.status != Freshness::Fresh {
                    stale.push(StaleCache {
                        key: key.to_string(),
                        metadata,
                        status,
                    });
                }
            }
        }
        Ok(stale)
    }

    /// Remove one entry (value, metadata, index membership). Used by the
    /// sweep; idempotent.
    pub async fn remove_entry(
        &self,
        key: &str,
        namespace: Option<&str>,
    ) -> Result<(), StorageError> {
        self.store
            .delete_batch(&[key.to_string(), keys::meta_key(key)])
            .await?;
        if let Some(ns) = namespace {
            self.store.index_remove(&keys::ns_index(ns), key).await?;
        }
        Ok(())
    }

    /// Pin an entry's remaining lifetime to `new_ttl` from now, updating
    /// both the value's expiry and the metadata record. Returns false when
    /// the value no longer exists (nothing to extend).
    pub async fn adjust_ttl(
        &self,
        key: &str,
        new_ttl: Duration,
    ) -> Result<bool, StorageError> {
        let Some(mut meta) = self.load_metadata(key).await? else {
            return Ok(false);
        };
        if !self.store.expire(key, new_ttl).await? {
            return Ok(false);
        }

        // Keep the invariant cached_at + ttl = expiry: the new expiry is
        // now + new_ttl, so the recorded lifetime grows by the elapsed age.
        let now = epoch_ms();
        meta.ttl_ms = meta.age_ms(now) + new_ttl.as_millis() as u64;
        let json = serde_json::to_string(&meta)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.store
            .set(&keys::meta_key(key), &json, Some(new_ttl))
            .await?;
        Ok(true)
    }

    /// Cost-tiered candidate generation.
    async fn candidates(&self, request: &InvalidationRequest) -> Result<Vec<String>, StorageError> {
        if let Some(ref namespace) = request.namespace {
            // O(1) index lookup
            return self.store.index_members(&keys::ns_index(namespace)).await;
        }

        if let Some(ref pattern) = request.pattern {
            // O(n) keyspace walk. Expensive and rate-limited by callers.
            warn!(pattern = %pattern, "Pattern invalidation without namespace hint, scanning keyspace");
            metrics::record_pattern_scan();
            let scanned = self.store.scan(pattern).await?;
            return Ok(scanned.into_iter().filter(|k| !keys::is_internal(k)).collect());
        }

        // Age/url criteria only: walk metadata records, since only entries
        // with metadata can satisfy these criteria anyway.
        let meta_keys = self.store.scan("meta:*").await?;
        Ok(meta_keys
            .into_iter()
            .filter_map(|k| k.strip_prefix("meta:").map(String::from))
            .collect())
    }

    /// Conjunctive check of every provided criterion against the entry's
    /// own metadata. Index membership got the candidate here; this is the
    /// final answer.
    fn matches(
        request: &InvalidationRequest,
        key: &str,
        meta: &CacheMetadata,
        now: i64,
    ) -> bool {
        if let Some(ref pattern) = request.pattern {
            if !wildcard_match(pattern, key) {
                return false;
            }
        }
        if let Some(ref namespace) = request.namespace {
            if meta.namespace.as_deref() != Some(namespace.as_str()) {
                return false;
            }
        }
        if let Some(older_than) = request.older_than_ms {
            if meta.age_ms(now) < older_than {
                return false;
            }
        }
        if let Some(ref url) = request.url {
            if meta.source_url.as_deref() != Some(url.as_str()) {
                return false;
            }
        }
        true
    }
}
