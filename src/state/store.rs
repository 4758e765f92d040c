//! State store trait definitions
//!
//! The dispatcher and the delta-based checks talk to these traits only;
//! backends are swapped between the file implementation and the in-memory
//! fake in tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::StateResult;
use crate::AlertKey;

/// Per-key alert lifecycle status.
///
/// `Cleared` is equivalent to `Unknown` for dispatch purposes; clearing a
/// key removes its record entirely, so a later `get` reports `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Unknown,
    Alerted,
    Cleared,
}

/// Durable per-key alert state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub key: AlertKey,
    pub status: AlertStatus,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRecord {
    /// The record a `get` reports for a key with no stored state.
    pub fn unknown(key: AlertKey) -> Self {
        Self {
            key,
            status: AlertStatus::Unknown,
            cooldown_until: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_alerted(&self) -> bool {
        self.status == AlertStatus::Alerted
    }

    pub fn cooldown_active(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

/// Trait for the per-key alert state backing the dispatcher.
///
/// Same-key concurrent writers are excluded by the process run lock, so
/// implementations only need per-record write atomicity.
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// Current record for a key; `Unknown` status if absent.
    async fn get(&self, key: &AlertKey) -> StateResult<AlertRecord>;

    /// Transition the key to `Alerted` and start a fresh cooldown window.
    async fn set_alerted(&self, key: &AlertKey, cooldown: Duration) -> StateResult<()>;

    /// Remove the key's record entirely; the next `get` reports `Unknown`.
    async fn clear(&self, key: &AlertKey) -> StateResult<()>;

    /// True iff a cooldown is set for the key and lies in the future.
    async fn is_cooldown_active(&self, key: &AlertKey) -> StateResult<bool> {
        Ok(self.get(key).await?.cooldown_active(Utc::now()))
    }

    /// Garbage-collect records untouched for `retention_days`; returns the
    /// number of records removed.
    async fn sweep_stale(&self, retention_days: u32) -> StateResult<usize>;
}

/// Trait for previous-sample baselines used by delta checks.
///
/// Values are opaque JSON so the trait stays narrow; each check owns its
/// baseline schema.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    async fn load(&self, name: &str) -> StateResult<Option<serde_json::Value>>;

    async fn store(&self, name: &str, value: serde_json::Value) -> StateResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_record_has_no_cooldown() {
        let record = AlertRecord::unknown(AlertKey::from("disk-root"));
        assert_eq!(record.status, AlertStatus::Unknown);
        assert!(!record.cooldown_active(Utc::now()));
    }

    #[test]
    fn cooldown_active_respects_expiry() {
        let now = Utc::now();
        let mut record = AlertRecord::unknown(AlertKey::from("disk-root"));
        record.cooldown_until = Some(now + Duration::minutes(5));
        assert!(record.cooldown_active(now));
        assert!(!record.cooldown_active(now + Duration::minutes(6)));
    }
}
