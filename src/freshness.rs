// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Freshness scoring for cached entries.
//!
//! Pure functions of [`CacheMetadata`] plus a clock reading. Nothing here
//! touches the store; the result is recomputed on every call and never
//! persisted.
//!
//! An entry moves through three states over its lifetime:
//!
//! ```text
//! cached_at ──────────────── 75% of ttl ──────────── cached_at + ttl
//!     │          Fresh           │        Stale            │  Expired
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache_meta::CacheMetadata;

/// Fraction of the TTL after which an entry counts as stale.
pub const STALE_RATIO: f64 = 0.75;

/// Access count above which a stale entry is flagged for proactive refresh.
/// Unpopular stale entries are left to expire naturally, bounding wasted
/// refresh work.
pub const REFRESH_ACCESS_THRESHOLD: u64 = 10;

/// Lifecycle state of a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Stale => write!(f, "stale"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Derived freshness classification. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessStatus {
    pub status: Freshness,
    /// Age at evaluation time (ms), clamped to zero under clock skew.
    pub age_ms: u64,
    /// Lifetime left (ms), zero once expired.
    pub ttl_remaining_ms: u64,
    /// 100 at creation, linearly down to 0 at expiry.
    pub freshness_score: f64,
    /// Whether the entry should be regenerated ahead of expiry.
    pub should_refresh: bool,
}

impl FreshnessStatus {
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.status != Freshness::Expired
    }
}

/// Classify an entry's freshness at `now_ms`.
///
/// `freshness_score` is `clamp(ttl_remaining / ttl * 100, 0, 100)`, and 0
/// once expired. `should_refresh` is true when expired, or when stale and
/// the entry is popular (`access_count > REFRESH_ACCESS_THRESHOLD`).
#[must_use]
pub fn calculate_freshness(meta: &CacheMetadata, now_ms: i64) -> FreshnessStatus {
    let age_ms = meta.age_ms(now_ms);
    let ttl_remaining_ms = meta.ttl_remaining_ms(now_ms);
    let expired = now_ms > meta.expires_at();

    let status = if expired {
        Freshness::Expired
    } else if age_ms as f64 > meta.ttl_ms as f64 * STALE_RATIO {
        Freshness::Stale
    } else {
        Freshness::Fresh
    };

    let freshness_score = if expired || meta.ttl_ms == 0 {
        0.0
    } else {
        (ttl_remaining_ms as f64 / meta.ttl_ms as f64 * 100.0).clamp(0.0, 100.0)
    };

    let should_refresh = match status {
        Freshness::Expired => true,
        Freshness::Stale => meta.access_count > REFRESH_ACCESS_THRESHOLD,
        Freshness::Fresh => false,
    };

    FreshnessStatus {
        status,
        age_ms,
        ttl_remaining_ms,
        freshness_score,
        should_refresh,
    }
}

/// Broad content classes, in increasing order of base lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    News,
    Pricing,
    Documentation,
    Knowledge,
    Static,
}

/// How often an entry is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPattern {
    Frequent,
    Moderate,
    Rare,
}

/// Suggest a TTL for new content.
///
/// Frequently-accessed content is served fresher (shorter TTL); rare content
/// lives longer to save recomputation.
#[must_use]
pub fn recommend_ttl(content_type: ContentType, access_pattern: AccessPattern) -> Duration {
    let base = match content_type {
        ContentType::News => Duration::from_secs(5 * 60),
        ContentType::Pricing => Duration::from_secs(60 * 60),
        ContentType::Documentation => Duration::from_secs(24 * 60 * 60),
        ContentType::Knowledge => Duration::from_secs(7 * 24 * 60 * 60),
        ContentType::Static => Duration::from_secs(30 * 24 * 60 * 60),
    };
    let multiplier = match access_pattern {
        AccessPattern::Frequent => 0.5,
        AccessPattern::Moderate => 1.0,
        AccessPattern::Rare => 2.0,
    };
    base.mul_f64(multiplier)
}
