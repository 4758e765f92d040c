//! Journal critical-event burst check
//!
//! Counts entries at priority crit and above in a bounded recent window.

use tracing::trace;

use super::CheckCtx;
use crate::AlertKey;

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let config = &ctx.config.checks.events;
    let since = format!("-{}m", config.window_minutes);

    let output = ctx
        .executor
        .run(
            "journalctl",
            &["-p", "2", "--since", &since, "-q", "--no-pager"],
        )
        .await?;

    let count = output.lines().count();
    let tier = config.entries.classify(count as f64);
    trace!("critical journal entries in last {}m: {count} -> {tier:?}", config.window_minutes);

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("journal-critical"),
            tier,
            &format!(
                "{count} critical journal entries in the last {} minutes",
                config.window_minutes
            ),
            "Critical journal entry rate is back to normal",
        )
        .await?;

    Ok(tier.is_failure() as usize)
}
