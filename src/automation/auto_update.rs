//! Auto-update task
//!
//! Refreshes the package index, counts pending updates, and applies them
//! (optionally security-only). The metric is the pending-update count, so
//! a successful run drops it toward zero.

use tracing::{info, warn};

use super::{TaskCtx, TaskRun};
use crate::checks::updates::count_pending;

pub async fn run(ctx: &TaskCtx, dry_run: bool) -> anyhow::Result<TaskRun> {
    let config = &ctx.config.automation.auto_update;

    // index refresh is read-only for installed state, safe in dry-run
    let refresh = ctx.executor.run("apt-get", &["update", "-q"]).await?;
    if !refresh.success() {
        warn!("apt-get update failed: {}", refresh.stderr.trim());
    }

    let before = pending_updates(ctx).await?;
    if before == 0 {
        return Ok(TaskRun::not_needed(0.0, "no action needed, system is up to date"));
    }

    if dry_run {
        return Ok(TaskRun {
            before_metric: before as f64,
            after_metric: before as f64,
            items_affected: before,
            succeeded: true,
            triggered: true,
            summary: format!("{before} update(s) would be applied"),
        });
    }

    let mut succeeded = true;
    if config.security_only {
        info!("applying security updates only");
        let output = ctx.executor.run("unattended-upgrade", &["-v"]).await?;
        if !output.success() {
            warn!("unattended-upgrade failed: {}", output.stderr.trim());
            succeeded = false;
        }
    } else {
        info!("applying {before} pending update(s)");
        let output = ctx
            .executor
            .run("apt-get", &["-y", "-o", "Dpkg::Options::=--force-confold", "upgrade"])
            .await?;
        if !output.success() {
            warn!("apt-get upgrade failed: {}", output.stderr.trim());
            succeeded = false;
        }
    }

    let after = pending_updates(ctx).await?;
    let applied = before.saturating_sub(after);

    Ok(TaskRun {
        before_metric: before as f64,
        after_metric: after as f64,
        items_affected: applied,
        succeeded,
        triggered: true,
        summary: format!("{applied} update(s) applied, {after} still pending"),
    })
}

async fn pending_updates(ctx: &TaskCtx) -> anyhow::Result<usize> {
    let output = ctx
        .executor
        .run("apt-get", &["-s", "-o", "Debug::NoLocking=true", "upgrade"])
        .await?;
    if !output.success() {
        anyhow::bail!("apt-get simulation failed: {}", output.stderr.trim());
    }
    Ok(count_pending(&output.stdout))
}
