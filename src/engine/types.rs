//! Outcome types for the engine's entry points.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::admission::AdmissionDecision;
use crate::freshness::FreshnessStatus;

/// Result of a read.
#[derive(Debug, Clone)]
pub enum CacheRead {
    /// Value present and not expired. `freshness` is `None` for entries
    /// whose metadata record is missing or malformed.
    Hit {
        value: String,
        freshness: Option<FreshnessStatus>,
    },
    /// Nothing usable cached; the caller computes the value and offers it
    /// back via `write`.
    Miss,
}

impl CacheRead {
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    /// The cached value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Hit { value, .. } => Some(value),
            Self::Miss => None,
        }
    }
}

/// Options for caching a freshly computed value.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Full lifetime for admitted entries; engine default when `None`.
    pub ttl: Option<Duration>,
    pub namespace: Option<String>,
    pub source_url: Option<String>,
    pub content_hash: Option<String>,
    pub tags: Vec<String>,
}

/// What happened to a write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub decision: AdmissionDecision,
    /// The TTL actually applied (probationary or full).
    pub ttl: Duration,
}

/// Summary of one background sweep pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Stale or expired entries examined.
    pub examined: usize,
    /// Entries removed (policy invalidation or expiry cleanup).
    pub removed: usize,
    /// Entries whose TTL a policy re-pinned.
    pub ttl_adjusted: usize,
    /// Popular stale entries worth regenerating ahead of expiry.
    pub refresh_candidates: Vec<String>,
}
