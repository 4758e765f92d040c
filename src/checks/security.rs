//! SSH brute-force check
//!
//! Counts failed authentication attempts in a bounded recent journal
//! window. The window, not a cumulative total, is what gets thresholded,
//! so one noisy night does not poison every later run.

use tracing::trace;

use super::CheckCtx;
use crate::AlertKey;

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let config = &ctx.config.checks.ssh;
    let since = format!("-{}m", config.window_minutes);

    let output = ctx
        .executor
        .run(
            "journalctl",
            &[
                "-u",
                "ssh",
                "-u",
                "sshd",
                "--since",
                &since,
                "-g",
                "Failed password|Invalid user",
                "-q",
                "--no-pager",
            ],
        )
        .await?;

    let count = output.lines().count();
    let tier = config.failures.classify(count as f64);
    trace!("ssh auth failures in last {}m: {count} -> {tier:?}", config.window_minutes);

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("ssh-bruteforce"),
            tier,
            &format!(
                "{count} failed SSH auth attempts in the last {} minutes",
                config.window_minutes
            ),
            "SSH auth failure rate is back to normal",
        )
        .await?;

    Ok(tier.is_failure() as usize)
}
