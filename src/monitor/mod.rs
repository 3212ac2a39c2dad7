// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! URL change monitoring.
//!
//! A [`UrlListener`] names an external source whose content feeds cached
//! entries. The engine owns no timer: the host execution model is
//! stateless-request-scoped, so an external scheduler (cron, queue
//! consumer) invokes [`UrlMonitor::check`] once per tick per listener.
//!
//! Per listener, a check is a pure state transition:
//!
//! ```text
//! unregistered → registered → {no-change, changed} → (disabled | deleted)
//! ```
//!
//! On a detected change the monitor invalidates the listener's namespace
//! (when configured), notifies the listener webhook and any downstream
//! partner webhooks independently, and only then persists the new
//! baseline hash.

pub mod canonical;
pub mod listener;
pub mod webhook;

pub use canonical::content_hash;
pub use listener::{ChangeEvent, ListenerRegistration, UrlListener};
pub use webhook::{HttpWebhookSink, WebhookSink};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache_meta::epoch_ms;
use crate::invalidation::{CacheInvalidator, InvalidationRequest};
use crate::keys;
use crate::metrics;
use crate::storage::traits::{CacheStore, StorageError};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("listener '{0}' not found")]
    ListenerNotFound(String),
    #[error("fetch of {url} failed: {message}")]
    Fetch { url: String, message: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Content retrieval seam. Production uses [`HttpFetcher`]; tests
/// substitute scripted bodies.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, MonitorError>;
}

/// Fetches URL bodies via `reqwest` with a bounded timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, MonitorError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MonitorError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(MonitorError::Fetch {
                url: url.to_string(),
                message: format!("status {}", response.status()),
            });
        }

        response.text().await.map_err(|e| MonitorError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Registers, persists, and checks URL listeners.
pub struct UrlMonitor {
    store: Arc<dyn CacheStore>,
    invalidator: Arc<CacheInvalidator>,
    fetcher: Arc<dyn Fetcher>,
    webhook_sink: Arc<dyn WebhookSink>,
    /// Downstream partners notified of every change event.
    partner_webhooks: Vec<String>,
}

impl UrlMonitor {
    pub fn new(
        store: Arc<dyn CacheStore>,
        invalidator: Arc<CacheInvalidator>,
        fetcher: Arc<dyn Fetcher>,
        webhook_sink: Arc<dyn WebhookSink>,
        partner_webhooks: Vec<String>,
    ) -> Self {
        Self {
            store,
            invalidator,
            fetcher,
            webhook_sink,
            partner_webhooks,
        }
    }

    /// Register a listener; returns its id.
    pub async fn register(&self, registration: ListenerRegistration) -> Result<String, MonitorError> {
        let id = Uuid::new_v4().to_string();
        let listener = UrlListener::from_registration(id.clone(), registration);

        self.persist(&listener).await?;
        self.store.index_add(keys::LISTENERS_ACTIVE, &id).await?;
        self.publish_listener_count().await;

        info!(listener_id = %id, url = %listener.url, namespace = %listener.namespace, "Registered URL listener");
        Ok(id)
    }

    /// Unregister a listener. Returns whether it existed.
    pub async fn unregister(&self, id: &str) -> Result<bool, MonitorError> {
        let existed = self.store.delete(&keys::listener_key(id)).await?;
        self.store.index_remove(keys::LISTENERS_ACTIVE, id).await?;
        self.publish_listener_count().await;

        if existed {
            info!(listener_id = %id, "Unregistered URL listener");
        }
        Ok(existed)
    }

    /// Load one listener.
    pub async fn get(&self, id: &str) -> Result<Option<UrlListener>, MonitorError> {
        match self.store.get(&keys::listener_key(id)).await? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(listener) => Ok(Some(listener)),
                Err(e) => {
                    warn!(listener_id = %id, error = %e, "Malformed listener record");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// All registered listeners.
    pub async fn list(&self) -> Result<Vec<UrlListener>, MonitorError> {
        let ids = self.store.index_members(keys::LISTENERS_ACTIVE).await?;
        let mut listeners = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(listener) = self.get(&id).await? {
                listeners.push(listener);
            }
        }
        Ok(listeners)
    }

    /// Enable or disable a listener without deleting its baseline.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool, MonitorError> {
        let Some(mut listener) = self.get(id).await? else {
            return Ok(false);
        };
        listener.enabled = enabled;
        self.persist(&listener).await?;
        Ok(true)
    }

    /// Run one check tick for a listener.
    ///
    /// Returns `Some(ChangeEvent)` when a meaningful change was detected
    /// and fully handled. A fetch failure is a no-op for the tick: the
    /// listener is untouched and the error is surfaced for the scheduler
    /// to retry on its own cadence.
    pub async fn check(&self, id: &str) -> Result<Option<ChangeEvent>, MonitorError> {
        let mut listener = self
            .get(id)
            .await?
            .ok_or_else(|| MonitorError::ListenerNotFound(id.to_string()))?;

        if !listener.enabled {
            debug!(listener_id = %id, "Listener disabled, skipping check");
            return Ok(None);
        }

        let body = match self.fetcher.fetch(&listener.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(listener_id = %id, url = %listener.url, error = %e, "URL fetch failed, skipping tick");
                metrics::record_url_check("fetch_error");
                return Err(e);
            }
        };

        let new_hash = content_hash(&body);
        let now = epoch_ms();

        if !listener.has_baseline() {
            // First successful poll: store the baseline, no event to emit
            listener.last_hash = new_hash;
            listener.last_check = now;
            self.persist(&listener).await?;
            metrics::record_url_check("baseline");
            debug!(listener_id = %id, "Stored baseline hash");
            return Ok(None);
        }

        if new_hash == listener.last_hash {
            listener.last_check = now;
            self.persist(&listener).await?;
            metrics::record_url_check("unchanged");
            return Ok(None);
        }

        let mut event = ChangeEvent {
            listener_id: listener.id.clone(),
            url: listener.url.clone(),
            changed_at: now,
            old_hash: listener.last_hash.clone(),
            new_hash: new_hash.clone(),
            caches_invalidated: 0,
        };

        if listener.invalidate_on_change {
            let request = InvalidationRequest::by_namespace(listener.namespace.as_str())
                .with_reason(format!("source changed: {}", listener.url));
            let result = self.invalidator.invalidate(&request).await?;
            event.caches_invalidated = result.invalidated;
        }

        // Listener webhook plus partner fan-out, concurrently; failures are
        // tallied per destination and never fail the check.
        let mut destinations: Vec<String> = Vec::new();
        if let Some(ref url) = listener.webhook {
            destinations.push(url.clone());
        }
        destinations.extend(self.partner_webhooks.iter().cloned());
        let (delivered, failed) =
            webhook::fan_out(self.webhook_sink.as_ref(), &destinations, &event).await;

        // Baseline advances only after the change is fully handled
        listener.last_hash = new_hash;
        listener.last_check = now;
        self.persist(&listener).await?;

        metrics::record_url_check("changed");
        metrics::record_change_event();
        info!(
            listener_id = %id,
            url = %listener.url,
            caches_invalidated = event.caches_invalidated,
            webhooks_delivered = delivered,
            webhooks_failed = failed,
            "Source change detected"
        );

        Ok(Some(event))
    }

    async fn persist(&self, listener: &UrlListener) -> Result<(), StorageError> {
        let json = serde_json::to_string(listener)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.store.set(&keys::listener_key(&listener.id), &json, None).await
    }

    async fn publish_listener_count(&self) {
        if let Ok(ids) = self.store.index_members(keys::LISTENERS_ACTIVE).await {
            metrics::set_active_listeners(ids.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_meta::CacheMetadata;
    use crate::monitor::webhook::WebhookError;
    use crate::storage::memory::MemoryStore;
    use parking_lot::Mutex;

    /// Fetcher returning a scripted sequence of bodies.
    struct ScriptedFetcher {
        bodies: Mutex<Vec<Result<String, String>>>,
    }

    impl ScriptedFetcher {
        fn new(bodies: Vec<Result<&str, &str>>) -> Self {
            Self {
                bodies: Mutex::new(
                    bodies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, MonitorError> {
            match self.bodies.lock().pop() {
                Some(Ok(body)) => Ok(body),
                Some(Err(message)) => Err(MonitorError::Fetch {
                    url: url.to_string(),
                    message,
                }),
                None => panic!("fetcher script exhausted"),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        deliveries: Mutex<Vec<(String, ChangeEvent)>>,
    }

    #[async_trait]
    impl WebhookSink for RecordingSink {
        async fn deliver(&self, url: &str, event: &ChangeEvent) -> Result<(), WebhookError> {
            self.deliveries.lock().push((url.to_string(), event.clone()));
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        invalidator: Arc<CacheInvalidator>,
        sink: Arc<RecordingSink>,
        monitor: UrlMonitor,
    }

    fn fixture(bodies: Vec<Result<&str, &str>>, partners: Vec<String>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let invalidator = Arc::new(CacheInvalidator::new(store.clone(), 0.05));
        let sink = Arc::new(RecordingSink::default());
        let monitor = UrlMonitor::new(
            store.clone(),
            invalidator.clone(),
            Arc::new(ScriptedFetcher::new(bodies)),
            sink.clone(),
            partners,
        );
        Fixture {
            store,
            invalidator,
            sink,
            monitor,
        }
    }

    fn registration(invalidate: bool, webhook: Option<&str>) -> ListenerRegistration {
        ListenerRegistration {
            url: "https://example.com/docs".into(),
            check_interval_secs: 300,
            namespace: "docs".into(),
            invalidate_on_change: invalidate,
            webhook: webhook.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let f = fixture(vec![], vec![]);

        let id = f.monitor.register(registration(false, None)).await.unwrap();

        let listeners = f.monitor.list().await.unwrap();
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].id, id);
        assert!(!listeners[0].has_baseline());
    }

    #[tokio::test]
    async fn test_unregister() {
        let f = fixture(vec![], vec![]);
        let id = f.monitor.register(registration(false, None)).await.unwrap();

        assert!(f.monitor.unregister(&id).await.unwrap());
        assert!(!f.monitor.unregister(&id).await.unwrap());
        assert!(f.monitor.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_unknown_listener() {
        let f = fixture(vec![], vec![]);
        let err = f.monitor.check("nope").await.unwrap_err();
        assert!(matches!(err, MonitorError::ListenerNotFound(_)));
    }

    #[tokio::test]
    async fn test_first_check_stores_baseline_no_event() {
        let f = fixture(vec![Ok("<p>v1</p>")], vec![]);
        let id = f.monitor.register(registration(true, None)).await.unwrap();

        let event = f.monitor.check(&id).await.unwrap();

        assert!(event.is_none());
        let listener = f.monitor.get(&id).await.unwrap().unwrap();
        assert!(listener.has_baseline());
        assert!(listener.last_check > 0);
        assert!(f.sink.deliveries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_content_updates_last_check_only() {
        let f = fixture(vec![Ok("<p>v1</p>"), Ok("<p>v1</p>")], vec![]);
        let id = f.monitor.register(registration(true, None)).await.unwrap();

        f.monitor.check(&id).await.unwrap();
        let baseline = f.monitor.get(&id).await.unwrap().unwrap().last_hash;

        let event = f.monitor.check(&id).await.unwrap();

        assert!(event.is_none());
        let listener = f.monitor.get(&id).await.unwrap().unwrap();
        assert_eq!(listener.last_hash, baseline);
    }

    #[tokio::test]
    async fn test_cosmetic_change_is_no_change() {
        let f = fixture(
            vec![
                Ok("<p>body</p><!-- rendered 2026-01-01T00:00:00Z -->"),
                Ok("<p>body</p><!-- rendered 2026-06-30T12:34:56Z -->"),
            ],
            vec![],
        );
        let id = f.monitor.register(registration(true, None)).await.unwrap();

        f.monitor.check(&id).await.unwrap();
        let event = f.monitor.check(&id).await.unwrap();

        assert!(event.is_none());
    }

    #[tokio::test]
    async fn test_change_emits_event_invalidates_and_notifies() {
        let f = fixture(
            vec![Ok("<p>v1</p>"), Ok("<p>v2</p>")],
            vec!["https://partner.example/hook".into()],
        );

        // Two cached entries derived from the monitored source
        for key in ["docs:a", "docs:b"] {
            f.store.set(key, "cached", None).await.unwrap();
            f.invalidator
                .register_cache(key, &CacheMetadata::new(60_000).with_namespace("docs"))
                .await
                .unwrap();
        }

        let id = f
            .monitor
            .register(registration(true, Some("https://hooks.example/cache")))
            .await
            .unwrap();

        f.monitor.check(&id).await.unwrap(); // baseline
        let event = f.monitor.check(&id).await.unwrap().expect("change event");

        assert_eq!(event.caches_invalidated, 2);
        assert_ne!(event.old_hash, event.new_hash);
        assert!(f.store.get("docs:a").await.unwrap().is_none());
        assert!(f.store.get("docs:b").await.unwrap().is_none());

        // Listener webhook exactly once, plus the partner fan-out
        let deliveries = f.sink.deliveries.lock();
        let urls: Vec<&str> = deliveries.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"https://hooks.example/cache"));
        assert!(urls.contains(&"https://partner.example/hook"));
        assert_eq!(deliveries[0].1.caches_invalidated, 2);

        // Baseline advanced only after full handling
        let listener = f.monitor.get(&id).await.unwrap().unwrap();
        assert_eq!(listener.last_hash, event.new_hash);
    }

    #[tokio::test]
    async fn test_change_without_invalidate_flag() {
        let f = fixture(vec![Ok("<p>v1</p>"), Ok("<p>v2</p>")], vec![]);

        f.store.set("docs:a", "cached", None).await.unwrap();
        f.invalidator
            .register_cache("docs:a", &CacheMetadata::new(60_000).with_namespace("docs"))
            .await
            .unwrap();

        let id = f.monitor.register(registration(false, None)).await.unwrap();
        f.monitor.check(&id).await.unwrap();
        let event = f.monitor.check(&id).await.unwrap().expect("change event");

        assert_eq!(event.caches_invalidated, 0);
        assert!(f.store.get("docs:a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_listener_untouched() {
        let f = fixture(vec![Ok("<p>v1</p>"), Err("connection refused"), Ok("<p>v2</p>")], vec![]);
        let id = f.monitor.register(registration(true, None)).await.unwrap();

        f.monitor.check(&id).await.unwrap();
        let before = f.monitor.get(&id).await.unwrap().unwrap();

        let err = f.monitor.check(&id).await.unwrap_err();
        assert!(matches!(err, MonitorError::Fetch { .. }));

        let after = f.monitor.get(&id).await.unwrap().unwrap();
        assert_eq!(after.last_hash, before.last_hash);
        assert_eq!(after.last_check, before.last_check);

        // Next tick still detects the change against the old baseline
        let event = f.monitor.check(&id).await.unwrap();
        assert!(event.is_some());
    }

    #[tokio::test]
    async fn test_disabled_listener_not_checked() {
        let f = fixture(vec![Ok("<p>v1</p>")], vec![]);
        let id = f.monitor.register(registration(true, None)).await.unwrap();

        assert!(f.monitor.set_enabled(&id, false).await.unwrap());

        let event = f.monitor.check(&id).await.unwrap();
        assert!(event.is_none());
        // Fetcher script untouched: re-enable and the body is still there
        assert!(f.monitor.set_enabled(&id, true).await.unwrap());
        assert!(f.monitor.check(&id).await.unwrap().is_none()); // baseline
    }
}
