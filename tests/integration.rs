//! Integration tests requiring a real Redis backend.
//!
//! Tests use testcontainers for portability - no external docker-compose
//! required.
//!
//! # Running Tests
//! ```bash
//! # Requires Docker
//! cargo test --test integration -- --ignored
//! ```
//!
//! # Test Organization
//! - `happy_*` - Normal operation: store contract, invalidation, admission

use std::sync::Arc;
use std::time::Duration;

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

use lifecycle_engine::{
    CacheInvalidator, CacheMetadata, CacheStore, InvalidationRequest, RedisStore,
    StoreBackedAdmission,
};
use lifecycle_engine::admission::{AdmissionControl, AdmissionDecision};

// =============================================================================
// Container Helpers
// =============================================================================

/// Create a Redis container with health check
fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

async fn store_for(docker: &Cli) -> (Container<'_, GenericImage>, Arc<RedisStore>) {
    let redis = redis_container(docker);
    let port = redis.get_host_port_ipv4(6379);
    let store = RedisStore::with_prefix(&format!("redis://127.0.0.1:{}", port), Some("test:"))
        .await
        .expect("Failed to connect to Redis");
    (redis, Arc::new(store))
}

// =============================================================================
// Happy Path Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_store_contract() {
    let docker = Cli::default();
    let (_redis, store) = store_for(&docker).await;

    // set / get / delete
    store.set("k1", "v1", None).await.unwrap();
    assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("v1"));
    assert!(store.delete("k1").await.unwrap());
    assert!(!store.delete("k1").await.unwrap());

    // TTL expiry
    store
        .set("short", "v", Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(store.get("short").await.unwrap().is_some());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(store.get("short").await.unwrap().is_none());

    // Scan with wildcard (server-side MATCH, prefix-transparent)
    store.set("chat:1", "a", None).await.unwrap();
    store.set("chat:2", "b", None).await.unwrap();
    store.set("doc:1", "c", None).await.unwrap();
    let keys = store.scan("chat:*").await.unwrap();
    assert_eq!(keys, vec!["chat:1".to_string(), "chat:2".to_string()]);

    // Set indexes
    store.index_add("ns:docs", "chat:1").await.unwrap();
    assert_eq!(
        store.index_members("ns:docs").await.unwrap(),
        vec!["chat:1".to_string()]
    );
    assert!(store.index_remove("ns:docs", "chat:1").await.unwrap());
    assert!(!store.index_remove("ns:docs", "chat:1").await.unwrap());

    // Batch delete
    let removed = store
        .delete_batch(&["chat:1".into(), "chat:2".into(), "ghost".into()])
        .await
        .unwrap();
    assert_eq!(removed, 2);

    // Atomic counters
    assert_eq!(
        store.counter_increment("c", Duration::from_secs(60)).await.unwrap(),
        1
    );
    assert_eq!(
        store.counter_increment("c", Duration::from_secs(60)).await.unwrap(),
        2
    );
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_invalidation_over_redis() {
    let docker = Cli::default();
    let (_redis, store) = store_for(&docker).await;
    let store: Arc<dyn CacheStore> = store;
    let invalidator = CacheInvalidator::new(store.clone(), 0.05);

    for key in ["docs:a", "docs:b"] {
        store.set(key, "cached", None).await.unwrap();
        invalidator
            .register_cache(key, &CacheMetadata::new(60_000).with_namespace("docs"))
            .await
            .unwrap();
    }

    let first = invalidator
        .invalidate(&InvalidationRequest::by_namespace("docs"))
        .await
        .unwrap();
    assert_eq!(first.invalidated, 2);
    assert!(store.get("docs:a").await.unwrap().is_none());

    let second = invalidator
        .invalidate(&InvalidationRequest::by_namespace("docs"))
        .await
        .unwrap();
    assert_eq!(second.invalidated, 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_store_backed_admission() {
    let docker = Cli::default();
    let (_redis, store) = store_for(&docker).await;
    let store: Arc<dyn CacheStore> = store;
    let admission = StoreBackedAdmission::new(store, 2, Duration::from_secs(60));

    // Popularity must survive "process" boundaries: only the store holds it
    assert_eq!(admission.admit("q").await, AdmissionDecision::Probation);
    assert_eq!(admission.admit("q").await, AdmissionDecision::Admit);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_concurrent_counter_increments() {
    let docker = Cli::default();
    let (_redis, store) = store_for(&docker).await;

    // Concurrent INCRs must not lose updates (atomic, not read-modify-write)
    let mut handles = vec![];
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..10 {
                store
                    .counter_increment("hot", Duration::from_secs(60))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let total = store
        .counter_increment("hot", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(total, 101);
}
