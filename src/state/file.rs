//! File-backed state stores
//!
//! One JSON record per alert key under `<state_dir>/alerts/`, one JSON
//! document per baseline under `<state_dir>/baselines/`. Writes go to a
//! temp file in the same directory followed by a rename, so a process
//! killed mid-write leaves either the old record or the new one, never a
//! truncated file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use super::error::{StateError, StateResult};
use super::store::{AlertRecord, AlertStateStore, AlertStatus, BaselineStore};
use crate::AlertKey;

pub struct FileAlertStateStore {
    dir: PathBuf,
}

impl FileAlertStateStore {
    pub fn new(state_dir: &Path) -> StateResult<Self> {
        let dir = state_dir.join("alerts");
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn record_path(&self, key: &AlertKey) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(key.as_str())))
    }
}

#[async_trait]
impl AlertStateStore for FileAlertStateStore {
    async fn get(&self, key: &AlertKey) -> StateResult<AlertRecord> {
        let path = self.record_path(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StateError::CorruptRecord(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(AlertRecord::unknown(key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_alerted(&self, key: &AlertKey, cooldown: Duration) -> StateResult<()> {
        let record = AlertRecord {
            key: key.clone(),
            status: AlertStatus::Alerted,
            cooldown_until: Some(Utc::now() + cooldown),
            updated_at: Utc::now(),
        };
        write_atomic(&self.record_path(key), &serde_json::to_vec_pretty(&record)?)
    }

    async fn clear(&self, key: &AlertKey) -> StateResult<()> {
        match std::fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            // already clear
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn sweep_stale(&self, retention_days: u32) -> StateResult<usize> {
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let stale = match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<AlertRecord>(&content) {
                    Ok(record) => record.updated_at < cutoff,
                    Err(e) => {
                        warn!("sweeping undecodable record {}: {e}", path.display());
                        true
                    }
                },
                Err(e) => {
                    warn!("cannot read {} during sweep: {e}", path.display());
                    continue;
                }
            };

            if stale {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("swept {removed} stale alert records");
        }
        Ok(removed)
    }
}

pub struct FileBaselineStore {
    dir: PathBuf,
}

impl FileBaselineStore {
    pub fn new(state_dir: &Path) -> StateResult<Self> {
        let dir = state_dir.join("baselines");
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn baseline_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(name)))
    }
}

#[async_trait]
impl BaselineStore for FileBaselineStore {
    async fn load(&self, name: &str) -> StateResult<Option<serde_json::Value>> {
        let path = self.baseline_path(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    // a corrupt baseline re-establishes itself on the next run
                    warn!("discarding corrupt baseline {}: {e}", path.display());
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, name: &str, value: serde_json::Value) -> StateResult<()> {
        write_atomic(&self.baseline_path(name), &serde_json::to_vec_pretty(&value)?)
    }
}

/// Temp-then-rename write in the target's directory.
fn write_atomic(path: &Path, contents: &[u8]) -> StateResult<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Keys are lowercase dash-separated already; anything else becomes '_'
/// so a key can never escape the store directory.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn get_missing_key_reports_unknown() {
        let dir = TempDir::new().unwrap();
        let store = FileAlertStateStore::new(dir.path()).unwrap();

        let record = store.get(&AlertKey::from("disk-root")).await.unwrap();
        assert_eq!(record.status, AlertStatus::Unknown);
    }

    #[tokio::test]
    async fn set_alerted_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileAlertStateStore::new(dir.path()).unwrap();
        let key = AlertKey::from("disk-root");

        store.set_alerted(&key, Duration::minutes(5)).await.unwrap();

        let record = store.get(&key).await.unwrap();
        assert_eq!(record.status, AlertStatus::Alerted);
        assert!(record.cooldown_active(Utc::now()));
        assert!(store.is_cooldown_active(&key).await.unwrap());
    }

    #[tokio::test]
    async fn clear_removes_record_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileAlertStateStore::new(dir.path()).unwrap();
        let key = AlertKey::from("svc-sshd");

        store.set_alerted(&key, Duration::minutes(5)).await.unwrap();
        store.clear(&key).await.unwrap();
        store.clear(&key).await.unwrap();

        let record = store.get(&key).await.unwrap();
        assert_eq!(record.status, AlertStatus::Unknown);
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_records() {
        let dir = TempDir::new().unwrap();
        let store = FileAlertStateStore::new(dir.path()).unwrap();

        store
            .set_alerted(&AlertKey::from("disk-root"), Duration::minutes(5))
            .await
            .unwrap();

        // age one record past the cutoff by rewriting its timestamp
        let old = AlertRecord {
            key: AlertKey::from("svc-old"),
            status: AlertStatus::Alerted,
            cooldown_until: None,
            updated_at: Utc::now() - Duration::days(30),
        };
        std::fs::write(
            dir.path().join("alerts/svc-old.json"),
            serde_json::to_vec(&old).unwrap(),
        )
        .unwrap();

        let removed = store.sweep_stale(14).await.unwrap();
        assert_eq!(removed, 1);

        let fresh = store.get(&AlertKey::from("disk-root")).await.unwrap();
        assert_eq!(fresh.status, AlertStatus::Alerted);
    }

    #[tokio::test]
    async fn baseline_round_trip_and_missing() {
        let dir = TempDir::new().unwrap();
        let store = FileBaselineStore::new(dir.path()).unwrap();

        assert!(store.load("iface-eth0").await.unwrap().is_none());

        store
            .store("iface-eth0", serde_json::json!({ "rx_errors": 12 }))
            .await
            .unwrap();

        let value = store.load("iface-eth0").await.unwrap().unwrap();
        assert_eq!(value["rx_errors"], 12);
    }

    #[tokio::test]
    async fn corrupt_baseline_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileBaselineStore::new(dir.path()).unwrap();

        std::fs::write(dir.path().join("baselines/broken.json"), b"{not json").unwrap();
        assert!(store.load("broken").await.unwrap().is_none());
    }

    #[test]
    fn sanitize_blocks_path_escapes() {
        assert_eq!(sanitize("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize("iface-rx-eth0"), "iface-rx-eth0");
    }
}
