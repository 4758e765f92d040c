//! Filesystem usage check

use std::path::Path;

use sysinfo::Disks;
use tracing::trace;

use super::CheckCtx;
use crate::AlertKey;

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let disks = Disks::new_with_refreshed_list();
    let mut issues = 0;

    for mount in &ctx.config.checks.disk.mounts {
        let Some(disk) = disks.iter().find(|d| d.mount_point() == mount) else {
            anyhow::bail!("mount point {} not found", mount.display());
        };

        let total = disk.total_space();
        if total == 0 {
            continue;
        }
        let used_percent = (total - disk.available_space()) as f64 / total as f64 * 100.0;

        let key = AlertKey::new(format!("disk-{}", mount_label(mount)));
        let tier = ctx.config.checks.disk.usage.classify(used_percent);
        trace!("{key}: {used_percent:.1}% -> {tier:?}");

        if tier.is_failure() {
            issues += 1;
        }
        ctx.dispatcher
            .alert_once(
                &key,
                tier,
                &format!(
                    "Disk usage on {} is {used_percent:.1}% (warning: {}%, critical: {}%)",
                    mount.display(),
                    ctx.config.checks.disk.usage.warning,
                    ctx.config.checks.disk.usage.critical
                ),
                &format!(
                    "Disk usage on {} is back to {used_percent:.1}%",
                    mount.display()
                ),
            )
            .await?;
    }

    Ok(issues)
}

/// `/` → `root`, `/var/lib/vz` → `var-lib-vz`
pub fn mount_label(mount: &Path) -> String {
    let trimmed = mount
        .to_string_lossy()
        .trim_matches('/')
        .replace('/', "-");
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed
    }
}
