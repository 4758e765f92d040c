//! ZFS pool checks: capacity percentage and pool health string
//!
//! Hosts without ZFS tooling skip this check with a log line instead of
//! raising a permanent false issue.

use tracing::{debug, trace};

use super::CheckCtx;
use crate::{AlertKey, Severity};

#[derive(Debug, PartialEq)]
pub struct PoolStatus {
    pub name: String,
    pub capacity_percent: f64,
    pub health: String,
}

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let output = match ctx
        .executor
        .run("zpool", &["list", "-H", "-o", "name,capacity,health"])
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!("zpool unavailable, skipping zfs check: {e:#}");
            return Ok(0);
        }
    };

    if !output.success() {
        anyhow::bail!("zpool list failed: {}", output.stderr.trim());
    }

    let mut issues = 0;

    for pool in parse_pool_list(&output.stdout) {
        let cap_key = AlertKey::new(format!("zfs-cap-{}", pool.name));
        let tier = ctx.config.checks.zfs.capacity.classify(pool.capacity_percent);
        trace!("{cap_key}: {:.0}% -> {tier:?}", pool.capacity_percent);

        if tier.is_failure() {
            issues += 1;
        }
        ctx.dispatcher
            .alert_once(
                &cap_key,
                tier,
                &format!(
                    "ZFS pool {} is {:.0}% full (warning: {}%, critical: {}%)",
                    pool.name,
                    pool.capacity_percent,
                    ctx.config.checks.zfs.capacity.warning,
                    ctx.config.checks.zfs.capacity.critical
                ),
                &format!(
                    "ZFS pool {} capacity is back to {:.0}%",
                    pool.name, pool.capacity_percent
                ),
            )
            .await?;

        let health_key = AlertKey::new(format!("zfs-health-{}", pool.name));
        let health_tier = if pool.health == "ONLINE" {
            Severity::Ok
        } else {
            Severity::Critical
        };
        if health_tier.is_failure() {
            issues += 1;
        }
        ctx.dispatcher
            .alert_once(
                &health_key,
                health_tier,
                &format!("ZFS pool {} is {} (expected ONLINE)", pool.name, pool.health),
                &format!("ZFS pool {} is ONLINE again", pool.name),
            )
            .await?;
    }

    Ok(issues)
}

/// Parse `zpool list -H -o name,capacity,health` output
/// (tab-separated, capacity like `42%`).
pub fn parse_pool_list(stdout: &str) -> Vec<PoolStatus> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?.to_string();
            let capacity = fields.next()?.trim_end_matches('%').parse().ok()?;
            let health = fields.next()?.to_string();
            Some(PoolStatus {
                name,
                capacity_percent: capacity,
                health,
            })
        })
        .collect()
}
