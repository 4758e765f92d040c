//! Memory relief task
//!
//! Drops the OS page/dentry/inode caches when memory usage exceeds the
//! trigger. Caches are rebuilt on demand; this buys headroom, it does not
//! fix a leak.

use tracing::warn;

use super::{TaskCtx, TaskRun, memory_usage_percent};

const DROP_CACHES: &str = "/proc/sys/vm/drop_caches";

pub async fn run(ctx: &TaskCtx, dry_run: bool) -> anyhow::Result<TaskRun> {
    let config = &ctx.config.automation.memory_relief;
    let before = memory_usage_percent();

    if before < config.trigger_percent {
        return Ok(TaskRun::not_needed(
            before,
            format!(
                "no action needed, memory usage {before:.1}% below trigger {:.1}%",
                config.trigger_percent
            ),
        ));
    }

    if dry_run {
        return Ok(TaskRun {
            before_metric: before,
            after_metric: before,
            items_affected: 1,
            succeeded: true,
            triggered: true,
            summary: "page/dentry/inode caches would be dropped".to_string(),
        });
    }

    // flush dirty pages first so the drop reclaims clean cache only
    let mut succeeded = true;
    let sync = ctx.executor.run("sync", &[]).await?;
    if !sync.success() {
        warn!("sync before cache drop failed: {}", sync.stderr.trim());
        succeeded = false;
    }

    if let Err(e) = std::fs::write(DROP_CACHES, "3\n") {
        warn!("cannot write {DROP_CACHES}: {e}");
        succeeded = false;
    }

    let after = memory_usage_percent();

    Ok(TaskRun {
        before_metric: before,
        after_metric: after,
        items_affected: succeeded as usize,
        succeeded,
        triggered: true,
        summary: if succeeded {
            format!("caches dropped, memory {before:.1}% -> {after:.1}%")
        } else {
            "cache drop failed".to_string()
        },
    })
}
