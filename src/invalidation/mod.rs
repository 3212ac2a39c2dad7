// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache invalidation: metadata ownership, namespace indexes, and bulk
//! removal.
//!
//! The [`CacheInvalidator`] owns the per-key metadata records and the
//! namespace membership indexes, and orchestrates conjunctive bulk
//! invalidation over them. Candidate generation is cost-tiered:
//!
//! - namespace given → read the namespace index SET (bounded cost)
//! - pattern without namespace → wildcard scan over the keyspace
//!   (unbounded cost, administrative use only)
//! - age/url only → scan over metadata records
//!
//! Index membership is a pre-filter, never the final answer: every
//! candidate is re-checked against the full conjunctive criteria from its
//! own metadata before deletion.

mod invalidator;

pub use invalidator::{CacheInvalidator, StaleCache};

use serde::{Deserialize, Serialize};

/// A bulk invalidation request. All provided criteria must hold for an
/// item to be removed (conjunctive, not disjunctive).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidationRequest {
    /// `*`-wildcard over cache keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Logical partition to invalidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Only entries at least this old (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than_ms: Option<u64>,
    /// Only entries derived from this source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form audit note, logged with the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Flag removed keys as candidates for proactive regeneration.
    #[serde(default)]
    pub pre_warm: bool,
}

impl InvalidationRequest {
    #[must_use]
    pub fn by_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn by_pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True when no criterion is present at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
            && self.namespace.is_none()
            && self.older_than_ms.is_none()
            && self.url.is_none()
    }
}

/// Outcome of a bulk invalidation. Zero matches is a normal result, not an
/// error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidationResult {
    /// Number of entries removed.
    pub invalidated: u64,
    /// Distinct namespaces the removed entries belonged to.
    pub namespaces: Vec<String>,
    /// Identities of the removed keys.
    pub cache_keys: Vec<String>,
    /// `invalidated × average regeneration cost` — an economic signal,
    /// not a guarantee.
    pub estimated_cost_impact: f64,
    /// Keys flagged for regeneration (when `pre_warm` was requested).
    pub pre_warmed: u64,
}
