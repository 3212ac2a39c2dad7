// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Frequency-based admission control.
//!
//! The doorkeeper pattern: on a cache miss, the freshly computed value is
//! only committed to the durable tier with its full TTL once the key has
//! been observed at least twice within the sketch window. A first-ever
//! miss gets a short probationary TTL instead. This keeps one-off queries
//! from evicting genuinely popular entries, at the cost of one guaranteed
//! extra recomputation per truly new key.
//!
//! Hits feed the counter too, so popularity accrues from both sides and a
//! recently-popular key does not decay in the estimate.
//!
//! The counter is an explicit, injected seam: [`LocalAdmission`] wraps an
//! in-process [`FrequencySketch`] for long-running hosts;
//! [`StoreBackedAdmission`] uses atomic counters on the backing store for
//! hosts with no process continuity between invocations.

pub mod sketch;

pub use sketch::FrequencySketch;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::keys;
use crate::metrics;
use crate::storage::traits::{CacheStore, StorageError};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Seen often enough: store with the full TTL.
    Admit,
    /// First sighting: store with the short probationary TTL.
    Probation,
}

impl AdmissionDecision {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admit => "admit",
            Self::Probation => "probation",
        }
    }
}

/// Injected popularity counter gating entry to the durable tier.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Feed a hit observation (no decision needed).
    async fn observe(&self, key: &str);

    /// Feed a miss observation and decide whether the recomputed value
    /// earns its full TTL.
    async fn admit(&self, key: &str) -> AdmissionDecision;
}

/// In-process sketch-backed admission for long-running hosts.
pub struct LocalAdmission {
    sketch: FrequencySketch,
    threshold: u64,
}

impl LocalAdmission {
    pub fn new(sketch: FrequencySketch, threshold: u64) -> Self {
        Self { sketch, threshold }
    }
}

#[async_trait]
impl AdmissionControl for LocalAdmission {
    async fn observe(&self, key: &str) {
        self.sketch.add(key);
    }

    async fn admit(&self, key: &str) -> AdmissionDecision {
        self.sketch.add(key);
        let decision = if self.sketch.estimate(key) >= self.threshold {
            AdmissionDecision::Admit
        } else {
            AdmissionDecision::Probation
        };
        metrics::record_admission(decision.as_str());
        decision
    }
}

/// Store-backed admission for stateless hosts: popularity must survive
/// across isolated invocations, so the count lives in the backing store
/// behind an atomic increment (never read-modify-write).
pub struct StoreBackedAdmission {
    store: Arc<dyn CacheStore>,
    threshold: u64,
    /// Counter lifetime; doubles as the observation window.
    window: Duration,
}

impl StoreBackedAdmission {
    pub fn new(store: Arc<dyn CacheStore>, threshold: u64, window: Duration) -> Self {
        Self {
            store,
            threshold,
            window,
        }
    }

    /// Counters are keyed by content hash, not raw key: bounded key size
    /// regardless of what callers use as cache keys.
    fn counter_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        keys::freq_key(&hex::encode(&hasher.finalize()[..16]))
    }

    async fn increment(&self, key: &str) -> Result<u64, StorageError> {
        self.store
            .counter_increment(&Self::counter_key(key), self.window)
            .await
    }
}

#[async_trait]
impl AdmissionControl for StoreBackedAdmission {
    async fn observe(&self, key: &str) {
        if let Err(e) = self.increment(key).await {
            // Observation is best-effort; losing one costs at most a
            // probationary write later
            warn!(error = %e, "Admission counter increment failed");
        }
    }

    async fn admit(&self, key: &str) -> AdmissionDecision {
        let decision = match self.increment(key).await {
            Ok(count) if count >= self.threshold => AdmissionDecision::Admit,
            Ok(_) => AdmissionDecision::Probation,
            Err(e) => {
                // Fail toward probation: the entry still gets cached, just
                // with the short TTL
                warn!(error = %e, "Admission counter unavailable, defaulting to probation");
                AdmissionDecision::Probation
            }
        };
        metrics::record_admission(decision.as_str());
        decision
    }
}
