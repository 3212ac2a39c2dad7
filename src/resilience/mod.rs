//! Resilience helpers for transient backend failures.

pub mod retry;

pub use retry::{retry, RetryConfig};
