//! URL listener records and change events.

use serde::{Deserialize, Serialize};

/// Parameters for registering a monitored URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerRegistration {
    pub url: String,
    /// Suggested polling cadence (seconds). The engine owns no timer; an
    /// external scheduler drives checks and may honor or ignore this.
    pub check_interval_secs: u64,
    /// Namespace whose entries derive from this URL.
    pub namespace: String,
    /// Invalidate that namespace when the source changes.
    #[serde(default)]
    pub invalidate_on_change: bool,
    /// Webhook notified of change events for this listener.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
}

/// One monitored source. Mutated on every poll (`last_check`/`last_hash`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlListener {
    pub id: String,
    pub url: String,
    pub check_interval_secs: u64,
    /// Epoch millis of the last completed check (0 = never checked).
    #[serde(default)]
    pub last_check: i64,
    /// Canonical content hash from the last check. Empty only before the
    /// first successful poll.
    #[serde(default)]
    pub last_hash: String,
    pub namespace: String,
    #[serde(default)]
    pub invalidate_on_change: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl UrlListener {
    pub fn from_registration(id: String, registration: ListenerRegistration) -> Self {
        Self {
            id,
            url: registration.url,
            check_interval_secs: registration.check_interval_secs,
            last_check: 0,
            last_hash: String::new(),
            namespace: registration.namespace,
            invalidate_on_change: registration.invalidate_on_change,
            webhook: registration.webhook,
            enabled: true,
        }
    }

    /// Whether this listener has ever completed a successful poll.
    #[must_use]
    pub fn has_baseline(&self) -> bool {
        !self.last_hash.is_empty()
    }
}

/// Emitted when a listener's canonical content hash changes. Ephemeral:
/// consumed by webhook dispatch and invalidation, kept only as an audit
/// record by whoever receives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub listener_id: String,
    pub url: String,
    /// Epoch millis at detection time.
    pub changed_at: i64,
    pub old_hash: String,
    pub new_hash: String,
    /// Entries removed by the change-triggered invalidation (0 when
    /// `invalidate_on_change` is off).
    pub caches_invalidated: u64,
}
