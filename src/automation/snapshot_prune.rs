//! ZFS snapshot pruning task
//!
//! Destroys snapshots whose name matches the configured pattern and whose
//! creation time is older than the retention window. The metric is the
//! total snapshot count, so an effective prune always shows a drop.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::{debug, warn};

use super::{TaskCtx, TaskRun};

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub name: String,
    pub created: DateTime<Utc>,
}

pub async fn run(ctx: &TaskCtx, dry_run: bool) -> anyhow::Result<TaskRun> {
    let config = &ctx.config.automation.snapshot_prune;
    let pattern = Regex::new(&config.pattern)?;

    let output = ctx
        .executor
        .run(
            "zfs",
            &["list", "-H", "-p", "-t", "snapshot", "-o", "name,creation"],
        )
        .await?;
    if !output.success() {
        anyhow::bail!("zfs list failed: {}", output.stderr.trim());
    }

    let snapshots = parse_snapshot_list(&output.stdout);
    let total = snapshots.len();
    let cutoff = Utc::now() - Duration::days(config.retention_days as i64);
    let eligible = eligible_snapshots(&snapshots, &pattern, cutoff);

    if eligible.is_empty() {
        return Ok(TaskRun::not_needed(
            total as f64,
            format!(
                "no action needed, no snapshots match '{}' older than {} days",
                config.pattern, config.retention_days
            ),
        ));
    }

    let mut destroyed = 0usize;
    let mut errors = 0usize;

    for snapshot in &eligible {
        if dry_run {
            debug!("would destroy {}", snapshot.name);
            destroyed += 1;
            continue;
        }

        let result = ctx.executor.run("zfs", &["destroy", &snapshot.name]).await;
        match result {
            Ok(output) if output.success() => {
                debug!("destroyed {}", snapshot.name);
                destroyed += 1;
            }
            Ok(output) => {
                warn!("zfs destroy {} failed: {}", snapshot.name, output.stderr.trim());
                errors += 1;
            }
            Err(e) => {
                warn!("zfs destroy {} failed: {e:#}", snapshot.name);
                errors += 1;
            }
        }
    }

    let after = if dry_run { total } else { total - destroyed };

    Ok(TaskRun {
        before_metric: total as f64,
        after_metric: after as f64,
        items_affected: destroyed,
        succeeded: errors == 0,
        triggered: true,
        summary: if dry_run {
            format!("{destroyed} snapshot(s) would be destroyed")
        } else {
            format!("{destroyed} snapshot(s) destroyed, {errors} error(s)")
        },
    })
}

/// Parse `zfs list -H -p -t snapshot -o name,creation`
/// (tab-separated, creation as epoch seconds).
pub fn parse_snapshot_list(stdout: &str) -> Vec<Snapshot> {
    stdout
        .lines()
        .filter_map(|line| {
            let (name, epoch) = line.split_once('\t')?;
            let epoch: i64 = epoch.trim().parse().ok()?;
            let created = DateTime::<Utc>::from_timestamp(epoch, 0)?;
            Some(Snapshot {
                name: name.trim().to_string(),
                created,
            })
        })
        .collect()
}

/// Snapshots matching the pattern (on the part after `@`) and older than
/// the cutoff.
pub fn eligible_snapshots<'a>(
    snapshots: &'a [Snapshot],
    pattern: &Regex,
    cutoff: DateTime<Utc>,
) -> Vec<&'a Snapshot> {
    snapshots
        .iter()
        .filter(|s| {
            let short_name = s.name.rsplit_once('@').map(|(_, n)| n).unwrap_or(&s.name);
            pattern.is_match(short_name) && s.created < cutoff
        })
        .collect()
}
