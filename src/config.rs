//! Configuration for the lifecycle engine.
//!
//! # Example
//!
//! ```
//! use lifecycle_engine::EngineConfig;
//!
//! // Minimal config (uses defaults)
//! let config = EngineConfig::default();
//! assert_eq!(config.admission_threshold, 2);
//!
//! // Full config
//! let config = EngineConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     key_prefix: "myapp:".into(),
//!     default_ttl_secs: 3600,
//!     probation_ttl_secs: 120,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the lifecycle engine.
///
/// All fields have sensible defaults. Configure `redis_url` for production
/// use; without it the engine runs against the in-memory store.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key prefix for namespacing when sharing a store with other apps
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Default lifetime for admitted entries (seconds)
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Short probationary lifetime for first-seen entries (seconds)
    #[serde(default = "default_probation_ttl_secs")]
    pub probation_ttl_secs: u64,

    /// Observations required before an entry earns its full TTL
    #[serde(default = "default_admission_threshold")]
    pub admission_threshold: u64,

    /// Frequency sketch dimensions
    #[serde(default = "default_sketch_width")]
    pub sketch_width: usize,
    #[serde(default = "default_sketch_depth")]
    pub sketch_depth: usize,

    /// Additions before all sketch counters are halved (0 = never age)
    #[serde(default = "default_sketch_reset_threshold")]
    pub sketch_reset_threshold: u64,

    /// Window for store-backed admission counters (seconds)
    #[serde(default = "default_admission_window_secs")]
    pub admission_window_secs: u64,

    /// Average cost of regenerating one entry (used for the economic
    /// impact estimate on invalidation results)
    #[serde(default = "default_avg_regeneration_cost")]
    pub avg_regeneration_cost: f64,

    /// Timeout for polling a monitored URL (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Per-destination webhook delivery timeout (seconds)
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// Downstream partner webhooks notified on every change event
    #[serde(default)]
    pub partner_webhooks: Vec<String>,
}

fn default_key_prefix() -> String { "lce:".to_string() }
fn default_ttl_secs() -> u64 { 3600 } // 1 hour
fn default_probation_ttl_secs() -> u64 { 60 }
fn default_admission_threshold() -> u64 { 2 }
fn default_sketch_width() -> usize { 1024 }
fn default_sketch_depth() -> usize { 4 }
fn default_sketch_reset_threshold() -> u64 { 10_240 }
fn default_admission_window_secs() -> u64 { 600 }
fn default_avg_regeneration_cost() -> f64 { 0.02 }
fn default_fetch_timeout_secs() -> u64 { 10 }
fn default_webhook_timeout_secs() -> u64 { 5 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
            default_ttl_secs: default_ttl_secs(),
            probation_ttl_secs: default_probation_ttl_secs(),
            admission_threshold: default_admission_threshold(),
            sketch_width: default_sketch_width(),
            sketch_depth: default_sketch_depth(),
            sketch_reset_threshold: default_sketch_reset_threshold(),
            admission_window_secs: default_admission_window_secs(),
            avg_regeneration_cost: default_avg_regeneration_cost(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            partner_webhooks: Vec::new(),
        }
    }
}
