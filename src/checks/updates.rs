//! Pending package updates check
//!
//! Simulated upgrade only; nothing is installed here. The auto-update
//! automation task owns applying updates.

use tracing::{debug, trace};

use super::CheckCtx;
use crate::AlertKey;

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let output = match ctx
        .executor
        .run("apt-get", &["-s", "-o", "Debug::NoLocking=true", "upgrade"])
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!("apt-get unavailable, skipping updates check: {e:#}");
            return Ok(0);
        }
    };

    if !output.success() {
        anyhow::bail!("apt-get simulation failed: {}", output.stderr.trim());
    }

    let pending = count_pending(&output.stdout);
    let tier = ctx.config.checks.updates.pending.classify(pending as f64);
    trace!("{pending} pending updates -> {tier:?}");

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("updates-pending"),
            tier,
            &format!(
                "{pending} package updates pending (warning: {}, critical: {})",
                ctx.config.checks.updates.pending.warning,
                ctx.config.checks.updates.pending.critical
            ),
            &format!("Pending updates are back under control ({pending})"),
        )
        .await?;

    Ok(tier.is_failure() as usize)
}

/// Count `Inst ` lines in `apt-get -s upgrade` output.
pub fn count_pending(stdout: &str) -> usize {
    stdout.lines().filter(|l| l.starts_with("Inst ")).count()
}
