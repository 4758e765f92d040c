//! Memory pressure checks: RAM usage, swap usage, and oom-kill events
//! within a bounded recent journal window (never cumulative totals).

use sysinfo::System;
use tracing::trace;

use super::CheckCtx;
use crate::{AlertKey, Severity};

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let mut sys = System::new();
    sys.refresh_memory();

    let mut issues = 0;
    let config = &ctx.config.checks.memory;

    let mem_percent = percent(sys.used_memory(), sys.total_memory());
    let tier = config.usage.classify(mem_percent);
    trace!("memory: {mem_percent:.1}% -> {tier:?}");
    if tier.is_failure() {
        issues += 1;
    }
    ctx.dispatcher
        .alert_once(
            &AlertKey::from("mem-usage"),
            tier,
            &format!(
                "Memory usage is {mem_percent:.1}% (warning: {}%, critical: {}%)",
                config.usage.warning, config.usage.critical
            ),
            &format!("Memory usage is back to {mem_percent:.1}%"),
        )
        .await?;

    // hosts without swap skip the swap pair entirely
    if sys.total_swap() > 0 {
        let swap_percent = percent(sys.used_swap(), sys.total_swap());
        let tier = config.swap.classify(swap_percent);
        trace!("swap: {swap_percent:.1}% -> {tier:?}");
        if tier.is_failure() {
            issues += 1;
        }
        ctx.dispatcher
            .alert_once(
                &AlertKey::from("swap-usage"),
                tier,
                &format!(
                    "Swap usage is {swap_percent:.1}% (warning: {}%, critical: {}%)",
                    config.swap.warning, config.swap.critical
                ),
                &format!("Swap usage is back to {swap_percent:.1}%"),
            )
            .await?;
    }

    issues += oom_events(ctx).await?;

    Ok(issues)
}

/// Count oom-kill events in the recent kernel journal window.
async fn oom_events(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let config = &ctx.config.checks.memory;
    let since = format!("-{}m", config.oom_window_minutes);

    let output = ctx
        .executor
        .run(
            "journalctl",
            &["-k", "--since", &since, "-g", "oom-kill|Out of memory", "-q", "--no-pager"],
        )
        .await?;

    let count = output.lines().count() as u64;
    trace!("oom events in last {}m: {count}", config.oom_window_minutes);

    let tier = if count > config.oom_max_events {
        Severity::Critical
    } else {
        Severity::Ok
    };

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("oom-events"),
            tier,
            &format!(
                "{count} oom-kill event(s) in the last {} minutes",
                config.oom_window_minutes
            ),
            "No oom-kill events in the recent window",
        )
        .await?;

    Ok(tier.is_failure() as usize)
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}
