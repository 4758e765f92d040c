//! Disk cleanup task
//!
//! Age-based deletion across the configured directory set, each with its
//! own retention policy. Triggered by root filesystem usage; in dry-run
//! mode the task only counts what it would delete.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::{TaskCtx, TaskRun, root_usage_percent};

pub async fn run(ctx: &TaskCtx, dry_run: bool) -> anyhow::Result<TaskRun> {
    let config = &ctx.config.automation.disk_cleanup;
    let before = root_usage_percent()?;

    if before < config.trigger_percent {
        return Ok(TaskRun::not_needed(
            before,
            format!(
                "no action needed, root usage {before:.1}% below trigger {:.1}%",
                config.trigger_percent
            ),
        ));
    }

    let mut removed = 0usize;
    let mut errors = 0usize;

    for dir in &config.directories {
        let cutoff = SystemTime::now() - Duration::from_secs(dir.retention_days as u64 * 86_400);
        match sweep_directory(&dir.path, cutoff, dry_run) {
            Ok(outcome) => {
                debug!(
                    "{}: {} file(s) {} (retention {} days)",
                    dir.path.display(),
                    outcome.removed,
                    if dry_run { "would be removed" } else { "removed" },
                    dir.retention_days
                );
                removed += outcome.removed;
                errors += outcome.errors;
            }
            Err(e) => {
                // one unreadable directory must not abort the others
                warn!("cleanup of {} failed: {e:#}", dir.path.display());
                errors += 1;
            }
        }
    }

    let after = if dry_run { before } else { root_usage_percent()? };

    Ok(TaskRun {
        before_metric: before,
        after_metric: after,
        items_affected: removed,
        succeeded: errors == 0,
        triggered: true,
        summary: if dry_run {
            format!("{removed} file(s) would be removed")
        } else {
            format!("{removed} file(s) removed, {errors} error(s)")
        },
    })
}

struct SweepOutcome {
    removed: usize,
    errors: usize,
}

/// Recursively remove (or, in dry-run, count) regular files whose mtime
/// is older than `cutoff`. Directories themselves are left in place.
fn sweep_directory(dir: &Path, cutoff: SystemTime, dry_run: bool) -> anyhow::Result<SweepOutcome> {
    let mut outcome = SweepOutcome {
        removed: 0,
        errors: 0,
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(outcome),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            match sweep_directory(&path, cutoff, dry_run) {
                Ok(sub) => {
                    outcome.removed += sub.removed;
                    outcome.errors += sub.errors;
                }
                Err(e) => {
                    warn!("cannot descend into {}: {e:#}", path.display());
                    outcome.errors += 1;
                }
            }
            continue;
        }

        if !file_type.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        if modified >= cutoff {
            continue;
        }

        if dry_run {
            outcome.removed += 1;
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => outcome.removed += 1,
            Err(e) => {
                warn!("cannot remove {}: {e}", path.display());
                outcome.errors += 1;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn old_cutoff() -> SystemTime {
        // everything just written is newer than this
        SystemTime::now() - Duration::from_secs(3600)
    }

    fn future_cutoff() -> SystemTime {
        // everything just written is older than this
        SystemTime::now() + Duration::from_secs(3600)
    }

    #[test]
    fn dry_run_counts_without_deleting() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.log"), b"x").unwrap();
        std::fs::write(dir.path().join("b.log"), b"y").unwrap();

        let outcome = sweep_directory(dir.path(), future_cutoff(), true).unwrap();
        assert_eq!(outcome.removed, 2);

        // both files still exist, untouched
        assert!(dir.path().join("a.log").exists());
        assert!(dir.path().join("b.log").exists());
    }

    #[test]
    fn real_run_deletes_only_old_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fresh.log"), b"x").unwrap();

        let outcome = sweep_directory(dir.path(), old_cutoff(), false).unwrap();
        assert_eq!(outcome.removed, 0);
        assert!(dir.path().join("fresh.log").exists());

        let outcome = sweep_directory(dir.path(), future_cutoff(), false).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(!dir.path().join("fresh.log").exists());
    }

    #[test]
    fn recurses_into_subdirectories_keeping_them() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("archive");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("old.gz"), b"x").unwrap();

        let outcome = sweep_directory(dir.path(), future_cutoff(), false).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(sub.exists());
    }

    #[test]
    fn missing_directory_is_empty_not_an_error() {
        let outcome =
            sweep_directory(Path::new("/nonexistent/cleanup/dir"), old_cutoff(), false).unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.errors, 0);
    }
}
