//! Append-only structured run log
//!
//! Every check result, automation step, and dispatch decision lands here
//! as one JSON line, regardless of whether a notification was delivered,
//! suppressed, or dropped. The notification channels are a filtered view;
//! this file is the complete local record.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::Severity;

#[derive(Debug, Serialize)]
struct LogLine<'a> {
    timestamp: chrono::DateTime<Utc>,
    level: Severity,
    component: &'a str,
    message: &'a str,
}

pub struct RunLog {
    path: PathBuf,
    // serializes appends from concurrent delivery futures
    write: Mutex<()>,
}

impl RunLog {
    pub fn new(log_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        Ok(Self {
            path: log_dir.join("warden.log"),
            write: Mutex::new(()),
        })
    }

    /// Append one structured line. Logging must never fail the caller;
    /// an append error is reported on stderr and swallowed.
    pub fn record(&self, level: Severity, component: &str, message: &str) {
        let line = LogLine {
            timestamp: Utc::now(),
            level,
            component,
            message,
        };

        let _guard = self.write.lock().unwrap();
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                let mut encoded = serde_json::to_vec(&line).unwrap_or_default();
                encoded.push(b'\n');
                file.write_all(&encoded)
            });

        if let Err(e) = result {
            warn!("run log append failed ({}): {e}", self.path.display());
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn records_append_as_json_lines() {
        let dir = TempDir::new().unwrap();
        let log = RunLog::new(dir.path()).unwrap();

        log.record(Severity::Info, "checks", "run started");
        log.record(Severity::Critical, "disk", "disk-root at 97%");

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["level"], "info");
        assert_eq!(first["component"], "checks");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["level"], "critical");
        assert_eq!(second["message"], "disk-root at 97%");
    }
}
