//! Cache entry metadata.
//!
//! [`CacheMetadata`] is the per-entry lifecycle record that flows through the
//! engine. One record exists per cached value, stored alongside it under a
//! `meta:` key with the same TTL as the value itself. Freshness is always
//! derived from this record, never stored.

use serde::{Deserialize, Serialize};

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Lifecycle metadata for a single cached entry.
///
/// # Example
///
/// ```
/// use lifecycle_engine::cache_meta::CacheMetadata;
///
/// let meta = CacheMetadata::new(60_000)
///     .with_namespace("docs")
///     .with_source_url("https://example.com/changelog");
///
/// assert_eq!(meta.ttl_ms, 60_000);
/// assert_eq!(meta.namespace.as_deref(), Some("docs"));
/// assert_eq!(meta.access_count, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Creation timestamp (epoch millis). `cached_at + ttl_ms` is the hard
    /// expiry instant.
    pub cached_at: i64,
    /// Lifetime in milliseconds.
    pub ttl_ms: u64,
    /// Optional logical partition, used to scope bulk invalidation cheaply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Provenance: the external source this entry was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Fingerprint of the source content at generation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Number of reads. Only increases; approximate under concurrency.
    #[serde(default)]
    pub access_count: u64,
    /// Timestamp of last read (epoch millis, 0 = never read).
    #[serde(default)]
    pub last_accessed: i64,
    /// Tags consulted by policy selectors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl CacheMetadata {
    /// Create metadata stamped now with the given lifetime.
    pub fn new(ttl_ms: u64) -> Self {
        Self::at(epoch_ms(), ttl_ms)
    }

    /// Create metadata with an explicit creation timestamp (epoch millis).
    pub fn at(cached_at: i64, ttl_ms: u64) -> Self {
        Self {
            cached_at,
            ttl_ms,
            namespace: None,
            source_url: None,
            content_hash: None,
            access_count: 0,
            last_accessed: 0,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Hard expiry instant (epoch millis).
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.cached_at.saturating_add(self.ttl_ms as i64)
    }

    /// Age at `now`, clamped to zero for skewed clocks (`now < cached_at`).
    #[must_use]
    pub fn age_ms(&self, now: i64) -> u64 {
        now.saturating_sub(self.cached_at).max(0) as u64
    }

    /// Milliseconds of lifetime left at `now`, zero once expired.
    #[must_use]
    pub fn ttl_remaining_ms(&self, now: i64) -> u64 {
        self.expires_at().saturating_sub(now).max(0) as u64
    }

    /// Record a read: bump the access counter and the last-access stamp.
    ///
    /// The counter is a heuristic freshness input, not a billing-grade
    /// counter; lost increments under concurrent reads are accepted.
    pub fn record_access(&mut self, now: i64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata() {
        let meta = CacheMetadata::new(5_000);

        assert_eq!(meta.ttl_ms, 5_000);
        assert!(meta.cached_at > 0);
        assert!(meta.namespace.is_none());
        assert!(meta.source_url.is_none());
        assert!(meta.content_hash.is_none());
        assert_eq!(meta.access_count, 0);
        assert_eq!(meta.last_accessed, 0);
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_builder_fields() {
        let meta = CacheMetadata::at(1_000, 2_000)
            .with_namespace("docs")
            .with_source_url("https://example.com")
            .with_content_hash("abc123")
            .with_tags(vec!["pricing".into()]);

        assert_eq!(meta.namespace.as_deref(), Some("docs"));
        assert_eq!(meta.source_url.as_deref(), Some("https://example.com"));
        assert_eq!(meta.content_hash.as_deref(), Some("abc123"));
        assert_eq!(meta.tags, vec!["pricing".to_string()]);
    }

    #[test]
    fn test_expires_at() {
        let meta = CacheMetadata::at(1_000, 500);
        assert_eq!(meta.expires_at(), 1_500);
    }

    #[test]
    fn test_age_clamps_negative() {
        // Clock skew: now earlier than cached_at must not go negative
        let meta = CacheMetadata::at(10_000, 1_000);
        assert_eq!(meta.age_ms(5_000), 0);
        assert_eq!(meta.age_ms(10_000), 0);
        assert_eq!(meta.age_ms(10_250), 250);
    }

    #[test]
    fn test_ttl_remaining() {
        let meta = CacheMetadata::at(1_000, 1_000);
        assert_eq!(meta.ttl_remaining_ms(1_000), 1_000);
        assert_eq!(meta.ttl_remaining_ms(1_600), 400);
        assert_eq!(meta.ttl_remaining_ms(2_000), 0);
        assert_eq!(meta.ttl_remaining_ms(9_999), 0);
    }

    #[test]
    fn test_record_access() {
        let mut meta = CacheMetadata::at(1_000, 1_000);

        meta.record_access(1_100);
        meta.record_access(1_200);

        assert_eq!(meta.access_count, 2);
        assert_eq!(meta.last_accessed, 1_200);
    }

    #[test]
    fn test_access_count_saturates() {
        let mut meta = CacheMetadata::at(0, 1);
        meta.access_count = u64::MAX;

        meta.record_access(100);

        assert_eq!(meta.access_count, u64::MAX);
    }

    #[test]
    fn test_serialize_skips_empty_optionals() {
        let meta = CacheMetadata::at(1_000, 2_000);
        let json = serde_json::to_string(&meta).unwrap();

        assert!(!json.contains("namespace"));
        assert!(!json.contains("source_url"));
        assert!(!json.contains("content_hash"));
        assert!(!json.contains("tags"));
    }

    #[test]
    fn test_roundtrip() {
        let meta = CacheMetadata::at(1_000, 2_000)
            .with_namespace("ns1")
            .with_tags(vec!["a".into(), "b".into()]);

        let json = serde_json::to_string(&meta).unwrap();
        let back: CacheMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(back.cached_at, meta.cached_at);
        assert_eq!(back.ttl_ms, meta.ttl_ms);
        assert_eq!(back.namespace, meta.namespace);
        assert_eq!(back.tags, meta.tags);
    }

    #[test]
    fn test_deserialize_tolerates_missing_counters() {
        // Older records without counters decode with zeroed defaults
        let json = r#"{"cached_at": 1000, "ttl_ms": 2000}"#;
        let meta: CacheMetadata = serde_json::from_str(json).unwrap();

        assert_eq!(meta.access_count, 0);
        assert_eq!(meta.last_accessed, 0);
    }

    #[test]
    fn test_epoch_ms_is_recent() {
        let before = epoch_ms();
        let meta = CacheMetadata::new(1);
        let after = epoch_ms();

        assert!(meta.cached_at >= before);
        assert!(meta.cached_at <= after);
    }
}
