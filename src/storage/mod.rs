//! Storage backends for the lifecycle engine.
//!
//! The engine treats the durable tier as a networked key-value service
//! behind the [`CacheStore`](traits::CacheStore) trait: get, set-with-TTL,
//! delete, wildcard scan, set-membership indexes, pipelined batch deletes,
//! and atomic counters. Single-key atomicity only; no multi-key
//! transactions.

pub mod traits;
pub mod memory;
pub mod redis;

pub use traits::{CacheStore, StorageError};
pub use memory::MemoryStore;
pub use redis::RedisStore;
