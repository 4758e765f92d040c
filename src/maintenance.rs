//! Maintenance window
//!
//! A time-bounded suppression switch consulted by both engines before any
//! notification leaves the host. While a window is active, checks still
//! run and still update alert state; only delivery is suppressed.
//!
//! The window record is written rarely (explicit enable/disable) and read
//! by every invocation; a missing record means "inactive", never an error,
//! and an expired record clears itself on the next read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::{StateError, StateResult};

/// Active maintenance window. `expires_at: None` means indefinite,
/// cleared only by an explicit disable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub enabled_at: DateTime<Utc>,
}

impl MaintenanceWindow {
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Current window if one is stored, expired or not.
    async fn get(&self) -> StateResult<Option<MaintenanceWindow>>;

    async fn set(&self, window: MaintenanceWindow) -> StateResult<()>;

    async fn remove(&self) -> StateResult<()>;

    /// Self-clearing read: an expired window is removed and reported
    /// inactive.
    async fn is_active(&self) -> StateResult<bool> {
        match self.get().await? {
            Some(window) if window.expired(Utc::now()) => {
                info!("maintenance window expired, clearing");
                self.remove().await?;
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }
}

/// Enable a window for `duration` (or indefinitely when `None`).
pub async fn enable(
    store: &dyn MaintenanceStore,
    duration: Option<Duration>,
    reason: &str,
) -> StateResult<MaintenanceWindow> {
    let window = MaintenanceWindow {
        reason: reason.to_string(),
        expires_at: duration.map(|d| Utc::now() + d),
        enabled_at: Utc::now(),
    };
    store.set(window.clone()).await?;
    info!(
        "maintenance enabled ({}), expires: {}",
        reason,
        window
            .expires_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    Ok(window)
}

pub async fn disable(store: &dyn MaintenanceStore) -> StateResult<()> {
    store.remove().await?;
    info!("maintenance disabled");
    Ok(())
}

pub struct FileMaintenanceStore {
    path: PathBuf,
}

impl FileMaintenanceStore {
    pub fn new(state_dir: &Path) -> StateResult<Self> {
        std::fs::create_dir_all(state_dir)?;
        Ok(Self {
            path: state_dir.join("maintenance.json"),
        })
    }
}

#[async_trait]
impl MaintenanceStore for FileMaintenanceStore {
    async fn get(&self) -> StateResult<Option<MaintenanceWindow>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| StateError::CorruptRecord(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, window: MaintenanceWindow) -> StateResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&window)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    async fn remove(&self) -> StateResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            // concurrent expiry or already disabled
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("maintenance record already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct MemoryMaintenanceStore {
    window: std::sync::Mutex<Option<MaintenanceWindow>>,
}

impl MemoryMaintenanceStore {
    pub fn new() -> Self {
        Self {
            window: std::sync::Mutex::new(None),
        }
    }
}

impl Default for MemoryMaintenanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MaintenanceStore for MemoryMaintenanceStore {
    async fn get(&self) -> StateResult<Option<MaintenanceWindow>> {
        Ok(self.window.lock().unwrap().clone())
    }

    async fn set(&self, window: MaintenanceWindow) -> StateResult<()> {
        *self.window.lock().unwrap() = Some(window);
        Ok(())
    }

    async fn remove(&self) -> StateResult<()> {
        *self.window.lock().unwrap() = None;
        Ok(())
    }
}
