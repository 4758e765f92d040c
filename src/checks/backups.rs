//! Backup freshness check
//!
//! Ages the newest artifact in the backup directory against the
//! configured hour thresholds. A missing or empty directory is itself a
//! finding, not a silent pass.

use std::path::Path;
use std::time::SystemTime;

use tracing::trace;

use super::CheckCtx;
use crate::{AlertKey, Severity};

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let config = &ctx.config.checks.backups;
    let key = AlertKey::from("backup-freshness");

    let Some(newest) = newest_artifact_age_hours(&config.directory)? else {
        ctx.dispatcher
            .alert_once(
                &key,
                Severity::Warning,
                &format!("No backup artifacts found in {}", config.directory.display()),
                "Backups are present again",
            )
            .await?;
        return Ok(1);
    };

    let tier = config.max_age_hours.classify(newest);
    trace!("newest backup is {newest:.1}h old -> {tier:?}");

    ctx.dispatcher
        .alert_once(
            &key,
            tier,
            &format!(
                "Newest backup in {} is {newest:.1} hours old (warning: {}h, critical: {}h)",
                config.directory.display(),
                config.max_age_hours.warning,
                config.max_age_hours.critical
            ),
            &format!("Backups are fresh again (newest: {newest:.1}h old)"),
        )
        .await?;

    Ok(tier.is_failure() as usize)
}

/// Age in hours of the newest regular file, `None` if there is none.
fn newest_artifact_age_hours(dir: &Path) -> anyhow::Result<Option<f64>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<SystemTime> = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.is_none_or(|n| modified > n) {
            newest = Some(modified);
        }
    }

    Ok(newest.map(|modified| {
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default()
            .as_secs_f64()
            / 3600.0
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_directory_reports_no_artifacts() {
        assert_eq!(
            newest_artifact_age_hours(Path::new("/nonexistent/backups")).unwrap(),
            None
        );
    }

    #[test]
    fn empty_directory_reports_no_artifacts() {
        let dir = TempDir::new().unwrap();
        assert_eq!(newest_artifact_age_hours(dir.path()).unwrap(), None);
    }

    #[test]
    fn fresh_file_has_near_zero_age() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("vzdump-qemu-101.vma.zst"), b"backup").unwrap();

        let age = newest_artifact_age_hours(dir.path()).unwrap().unwrap();
        assert!(age < 0.1, "age was {age}");
    }
}
