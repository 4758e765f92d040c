//! In-memory state stores (no persistence)
//!
//! Back the dispatcher and check-engine tests so the state-machine logic
//! can be exercised without a filesystem.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::error::StateResult;
use super::store::{AlertRecord, AlertStateStore, AlertStatus, BaselineStore};
use crate::AlertKey;

#[derive(Default)]
pub struct MemoryAlertStateStore {
    records: Mutex<HashMap<AlertKey, AlertRecord>>,
}

impl MemoryAlertStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, for test assertions.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AlertStateStore for MemoryAlertStateStore {
    async fn get(&self, key: &AlertKey) -> StateResult<AlertRecord> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_else(|| AlertRecord::unknown(key.clone())))
    }

    async fn set_alerted(&self, key: &AlertKey, cooldown: Duration) -> StateResult<()> {
        self.records.lock().unwrap().insert(
            key.clone(),
            AlertRecord {
                key: key.clone(),
                status: AlertStatus::Alerted,
                cooldown_until: Some(Utc::now() + cooldown),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn clear(&self, key: &AlertKey) -> StateResult<()> {
        self.records.lock().unwrap().remove(key);
        Ok(())
    }

    async fn sweep_stale(&self, retention_days: u32) -> StateResult<usize> {
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, record| record.updated_at >= cutoff);
        Ok(before - records.len())
    }
}

#[derive(Default)]
pub struct MemoryBaselineStore {
    baselines: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaselineStore for MemoryBaselineStore {
    async fn load(&self, name: &str) -> StateResult<Option<serde_json::Value>> {
        Ok(self.baselines.lock().unwrap().get(name).cloned())
    }

    async fn store(&self, name: &str, value: serde_json::Value) -> StateResult<()> {
        self.baselines.lock().unwrap().insert(name.to_string(), value);
        Ok(())
    }
}
