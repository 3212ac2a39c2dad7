// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The lifecycle coordinator.
//!
//! [`LifecycleEngine`] ties the components together: a read consults the
//! freshness calculator to decide hit/stale/expired, a write consults the
//! admission filter before the durable tier gets a full-TTL entry, and a
//! background sweep pairs the invalidator's stale scan with the policy
//! engine to decide TTL adjustments and evictions.
//!
//! Every entry point is safely callable concurrently and idempotently:
//! the host may run each invocation in an isolated, short-lived context
//! with no continuity between calls, so no engine state lives outside the
//! backing store and the injected admission counter.

mod types;

pub use types::{CacheRead, SweepReport, WriteOptions, WriteOutcome};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::admission::{AdmissionControl, AdmissionDecision, FrequencySketch, LocalAdmission, StoreBackedAdmission};
use crate::cache_meta::{epoch_ms, CacheMetadata};
use crate::config::EngineConfig;
use crate::freshness::{calculate_freshness, Freshness};
use crate::invalidation::{CacheInvalidator, InvalidationRequest, InvalidationResult};
use crate::metrics;
use crate::monitor::{HttpFetcher, HttpWebhookSink, UrlMonitor};
use crate::policy::{PolicyDecision, PolicyEngine};
use crate::storage::memory::MemoryStore;
use crate::storage::redis::RedisStore;
use crate::storage::traits::{CacheStore, StorageError};

pub struct LifecycleEngine {
    config: EngineConfig,
    store: Arc<dyn CacheStore>,
    invalidator: Arc<CacheInvalidator>,
    admission: Arc<dyn AdmissionControl>,
    policies: PolicyEngine,
}

impl LifecycleEngine {
    /// Assemble an engine from explicit parts.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CacheStore>,
        admission: Arc<dyn AdmissionControl>,
        policies: PolicyEngine,
    ) -> Self {
        let invalidator = Arc::new(CacheInvalidator::new(
            store.clone(),
            config.avg_regeneration_cost,
        ));
        Self {
            config,
            store,
            invalidator,
            admission,
            policies,
        }
    }

    /// In-memory engine with a process-local sketch. For tests and
    /// single-process deployments with process continuity.
    pub fn in_memory(config: EngineConfig, policies: PolicyEngine) -> Self {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let sketch = FrequencySketch::new(
            config.sketch_width,
            config.sketch_depth,
            config.sketch_reset_threshold,
        );
        let admission: Arc<dyn AdmissionControl> =
            Arc::new(LocalAdmission::new(sketch, config.admission_threshold));
        Self::new(config, store, admission, policies)
    }

    /// Redis-backed engine with store-backed admission counters: the
    /// configuration for stateless hosts, where popularity must survive
    /// across isolated invocations.
    pub async fn connect(config: EngineConfig, policies: PolicyEngine) -> Result<Self, StorageError> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| StorageError::Backend("redis_url not configured".into()))?;
        let store: Arc<dyn CacheStore> =
            Arc::new(RedisStore::with_prefix(url, Some(&config.key_prefix)).await?);
        let admission: Arc<dyn AdmissionControl> = Arc::new(StoreBackedAdmission::new(
            store.clone(),
            config.admission_threshold,
            Duration::from_secs(config.admission_window_secs),
        ));
        info!(prefix = %config.key_prefix, "Connected lifecycle engine to Redis");
        Ok(Self::new(config, store, admission, policies))
    }

    #[must_use]
    pub fn invalidator(&self) -> &Arc<CacheInvalidator> {
        &self.invalidator
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a URL monitor sharing this engine's store and invalidator,
    /// with HTTP transports configured from the engine config. The caller
    /// owns the polling cadence (the engine has no timer).
    #[must_use]
    pub fn url_monitor(&self) -> UrlMonitor {
        UrlMonitor::new(
            self.store.clone(),
            self.invalidator.clone(),
            Arc::new(HttpFetcher::new(Duration::from_secs(self.config.fetch_timeout_secs))),
            Arc::new(HttpWebhookSink::new(Duration::from_secs(
                self.config.webhook_timeout_secs,
            ))),
            self.config.partner_webhooks.clone(),
        )
    }

    /// Read a cached value, classifying its freshness.
    ///
    /// Expired entries read as misses and are cleaned up on the spot.
    /// Hits feed the admission counter and bump the entry's access count.
    pub async fn read(&self, key: &str) -> Result<CacheRead, StorageError> {
        let _timer = metrics::LatencyTimer::new("read");

        let Some(value) = self.store.get(key).await? else {
            metrics::record_read("miss");
            return Ok(CacheRead::Miss);
        };

        match self.invalidator.load_metadata(key).await? {
            Some(meta) => {
                let status = calculate_freshness(&meta, epoch_ms());
                if !status.is_usable() {
                    // The backing store's expiry should have fired; make it so
                    self.invalidator
                        .remove_entry(key, meta.namespace.as_deref())
                        .await?;
                    metrics::record_read("expired");
                    return Ok(CacheRead::Miss);
                }

                self.invalidator.record_access(key).await?;
                self.admission.observe(key).await;

                metrics::record_read(if status.status == Freshness::Stale {
                    "stale_hit"
                } else {
                    "hit"
                });
                Ok(CacheRead::Hit {
                    value,
                    freshness: Some(status),
                })
            }
            None => {
                // Value without metadata: serve it, but freshness is unknowable
                self.admission.observe(key).await;
                metrics::record_read("hit");
                Ok(CacheRead::Hit {
                    value,
                    freshness: None,
                })
            }
        }
    }

    /// Offer a freshly computed value for caching.
    ///
    /// The admission filter decides between the full TTL and the short
    /// probationary TTL; either way the value is stored and registered.
    pub async fn write(
        &self,
        key: &str,
        value: &str,
        options: WriteOptions,
    ) -> Result<WriteOutcome, StorageError> {
        let _timer = metrics::LatencyTimer::new("write");

        let decision = self.admission.admit(key).await;
        let ttl = match decision {
            AdmissionDecision::Admit => options
                .ttl
                .unwrap_or(Duration::from_secs(self.config.default_ttl_secs)),
            AdmissionDecision::Probation => Duration::from_secs(self.config.probation_ttl_secs),
        };

        self.store.set(key, value, Some(ttl)).await?;

        let mut meta = CacheMetadata::new(ttl.as_millis() as u64).with_tags(options.tags);
        meta.namespace = options.namespace;
        meta.source_url = options.source_url;
        meta.content_hash = options.content_hash;
        self.invalidator.register_cache(key, &meta).await?;

        debug!(key, decision = decision.as_str(), ttl_secs = ttl.as_secs(), "Cached value");
        Ok(WriteOutcome { decision, ttl })
    }

    /// Bulk invalidation passthrough.
    pub async fn invalidate(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationResult, StorageError> {
        self.invalidator.invalidate(request).await
    }

    /// One background sweep: scan for stale/expired entries, apply policy
    /// decisions, clean up the expired, and surface refresh candidates.
    ///
    /// Unbounded latency; never call on a request path.
    pub async fn sweep(&self) -> Result<SweepReport, StorageError> {
        let _timer = metrics::LatencyTimer::new("sweep");

        let stale = self.invalidator.stale_caches().await?;
        let mut report = SweepReport {
            examined: stale.len(),
            ..Default::default()
        };

        for entry in stale {
            match self.policies.evaluate(&entry.key, &entry.metadata.tags) {
                PolicyDecision::Invalidate { policy_id } => {
                    debug!(key = %entry.key, policy_id = %policy_id, "Sweep: policy invalidation");
                    self.invalidator
                        .remove_entry(&entry.key, entry.metadata.namespace.as_deref())
                        .await?;
                    report.removed += 1;
                }
                PolicyDecision::Ttl {
                    duration_seconds,
                    policy_id,
                } => {
                    let adjusted = self
                        .invalidator
                        .adjust_ttl(&entry.key, Duration::from_secs(duration_seconds))
                        .await?;
                    if adjusted {
                        debug!(key = %entry.key, policy_id = %policy_id, duration_seconds, "Sweep: TTL re-pinned");
                        report.ttl_adjusted += 1;
                    } else {
                        // Value already gone; drop the leftover metadata
                        self.invalidator
                            .remove_entry(&entry.key, entry.metadata.namespace.as_deref())
                            .await?;
                        report.removed += 1;
                    }
                }
                PolicyDecision::None => {
                    if entry.status.status == Freshness::Expired {
                        self.invalidator
                            .remove_entry(&entry.key, entry.metadata.namespace.as_deref())
                            .await?;
                        report.removed += 1;
                    } else if entry.status.should_refresh {
                        report.refresh_candidates.push(entry.key);
                    }
                }
            }
        }

        report.refresh_candidates.sort();
        metrics::record_sweep(report.examined, report.removed, report.ttl_adjusted);
        info!(
            examined = report.examined,
            removed = report.removed,
            ttl_adjusted = report.ttl_adjusted,
            refresh_candidates = report.refresh_candidates.len(),
            "Sweep complete"
        );
        Ok(report)
    }
}
