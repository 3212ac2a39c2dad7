// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Webhook delivery for change events.
//!
//! Delivery is fire-and-forget with a bounded per-destination timeout:
//! a dead subscriber must never fail the check that detected the change,
//! and one subscriber's failure never blocks delivery to the others.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use super::listener::ChangeEvent;
use crate::metrics;

/// Header identifying the event class on outbound webhook POSTs.
pub const EVENT_HEADER: &str = "x-cache-event";
/// Event class for source-change notifications.
pub const EVENT_URL_CHANGE: &str = "url.change";

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("webhook delivery to {url} failed: {message}")]
    Delivery { url: String, message: String },
}

/// Outbound notification seam. Production uses [`HttpWebhookSink`]; tests
/// substitute a recorder.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn deliver(&self, url: &str, event: &ChangeEvent) -> Result<(), WebhookError>;
}

/// Delivers change events as JSON POSTs via `reqwest`.
pub struct HttpWebhookSink {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpWebhookSink {
    /// Build a sink with the given per-delivery timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn payload(event: &ChangeEvent) -> serde_json::Value {
        json!({
            "event": EVENT_URL_CHANGE,
            "listener_id": event.listener_id,
            "url": event.url,
            "changed_at": event.changed_at,
            "old_hash": event.old_hash,
            "new_hash": event.new_hash,
            "caches_invalidated": event.caches_invalidated,
        })
    }
}

impl Default for HttpWebhookSink {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn deliver(&self, url: &str, event: &ChangeEvent) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .header(EVENT_HEADER, EVENT_URL_CHANGE)
            .timeout(self.timeout)
            .json(&Self::payload(event))
            .send()
            .await
            .map_err(|e| WebhookError::Delivery {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(WebhookError::Delivery {
                url: url.to_string(),
                message: format!("status {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Deliver an event to every destination concurrently, isolating failures.
///
/// Returns `(delivered, failed)`. Each destination gets its own attempt;
/// failures are logged and tallied, never propagated.
pub async fn fan_out(
    sink: &dyn WebhookSink,
    destinations: &[String],
    event: &ChangeEvent,
) -> (usize, usize) {
    if destinations.is_empty() {
        return (0, 0);
    }

    let attempts = destinations.iter().map(|url| async move {
        match sink.deliver(url, event).await {
            Ok(()) => {
                debug!(url, listener_id = %event.listener_id, "Webhook delivered");
                metrics::record_webhook_delivery("success");
                true
            }
            Err(e) => {
                warn!(url, error = %e, "Webhook delivery failed");
                metrics::record_webhook_delivery("error");
                false
            }
        }
    });

    let results = futures::future::join_all(attempts).await;
    let delivered = results.iter().filter(|ok| **ok).count();
    (delivered, results.len() - delivered)
}
