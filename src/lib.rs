//! # Lifecycle Engine
//!
//! A cache lifecycle layer for expensive, non-deterministic compute
//! (large-model completions). Callers see a key-value cache; internally
//! this is a small policy engine plus a change-detection subsystem that
//! decides what to keep, for how long, when to throw it away, and whether
//! a new entry is worth keeping at all.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Request Paths                          │
//! │  read()  → freshness classification (hit / stale / expired) │
//! │  write() → admission filter (full TTL vs probationary TTL)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Lifecycle Components                     │
//! │  • Freshness calculator (pure, derived, never stored)       │
//! │  • Frequency sketch doorkeeper (count-min, aged)            │
//! │  • Policy engine (priority rules, first match wins)         │
//! │  • Cache invalidator (metadata + namespace indexes)         │
//! │  • URL change monitor (canonical hash + webhooks)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Backing Store                          │
//! │  • Redis (production): SETs, pipelines, atomic counters     │
//! │  • In-memory (tests / single process)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use lifecycle_engine::{EngineConfig, LifecycleEngine, PolicyEngine, WriteOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = LifecycleEngine::in_memory(
//!         EngineConfig::default(),
//!         PolicyEngine::new(vec![]).expect("empty rule set always loads"),
//!     );
//!
//!     // First sighting: cached on probation
//!     let outcome = engine
//!         .write("prompt:greeting", "Hello!", WriteOptions::default())
//!         .await
//!         .expect("write failed");
//!     println!("cached with ttl {:?}", outcome.ttl);
//!
//!     if let Ok(read) = engine.read("prompt:greeting").await {
//!         println!("cached value: {:?}", read.value());
//!     }
//! }
//! ```
//!
//! ## Execution model
//!
//! No component assumes a single persistent process. Polling is driven by
//! an external scheduler calling [`UrlMonitor::check`] per tick; the
//! admission counter is an injected seam (in-process sketch or
//! store-backed atomic counters); sweeps are explicit background calls.
//!
//! ## Modules
//!
//! - [`engine`]: the [`LifecycleEngine`] coordinator
//! - [`freshness`]: pure freshness scoring and TTL recommendation
//! - [`policy`]: declarative lifecycle rules
//! - [`invalidation`]: metadata, namespace indexes, bulk invalidation
//! - [`monitor`]: URL change detection and webhook dispatch
//! - [`admission`]: frequency sketch and doorkeeper admission
//! - [`tiersim`]: in-memory tier simulation harness
//! - [`storage`]: backing store trait + Redis / in-memory backends

pub mod admission;
pub mod cache_meta;
pub mod config;
pub mod engine;
pub mod freshness;
pub mod invalidation;
pub mod keys;
pub mod metrics;
pub mod monitor;
pub mod policy;
pub mod resilience;
pub mod storage;
pub mod tiersim;

pub use admission::{AdmissionControl, AdmissionDecision, FrequencySketch, LocalAdmission, StoreBackedAdmission};
pub use cache_meta::CacheMetadata;
pub use config::EngineConfig;
pub use engine::{CacheRead, LifecycleEngine, SweepReport, WriteOptions, WriteOutcome};
pub use freshness::{calculate_freshness, recommend_ttl, AccessPattern, ContentType, Freshness, FreshnessStatus};
pub use invalidation::{CacheInvalidator, InvalidationRequest, InvalidationResult};
pub use monitor::{ChangeEvent, Fetcher, HttpFetcher, HttpWebhookSink, ListenerRegistration, MonitorError, UrlListener, UrlMonitor, WebhookSink};
pub use policy::{Policy, PolicyAction, PolicyDecision, PolicyEngine, PolicyError};
pub use storage::{CacheStore, MemoryStore, RedisStore, StorageError};
pub use tiersim::{TierLevel, TierSimConfig, TierSimulator};
