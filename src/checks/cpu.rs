//! CPU pressure checks: normalized load average and iowait percentage.
//!
//! iowait is computed from two /proc/stat samples a couple of seconds
//! apart; the underlying counters are monotonic cumulative ticks, so only
//! the delta is meaningful.

use sysinfo::System;
use tracing::trace;

use super::CheckCtx;
use crate::AlertKey;

pub async fn run_load(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let load = System::load_average();
    let cores = num_cpus();
    let per_core_percent = load.five / cores as f64 * 100.0;

    let tier = ctx.config.checks.load.per_core.classify(per_core_percent);
    trace!("load5 {:.2} over {cores} cores: {per_core_percent:.0}% -> {tier:?}", load.five);

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("load-avg"),
            tier,
            &format!(
                "Load average (5m) is {:.2} on {cores} cores ({per_core_percent:.0}% per core)",
                load.five
            ),
            &format!("Load average (5m) is back to {:.2}", load.five),
        )
        .await?;

    Ok(tier.is_failure() as usize)
}

pub async fn run_iowait(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let gap = std::time::Duration::from_secs(ctx.config.checks.iowait.sample_gap_secs);

    let first = read_cpu_ticks()?;
    tokio::time::sleep(gap).await;
    let second = read_cpu_ticks()?;

    let percent = iowait_percent(&first, &second)
        .ok_or_else(|| anyhow::anyhow!("no cpu tick delta between samples"))?;

    let tier = ctx.config.checks.iowait.percent.classify(percent);
    trace!("iowait: {percent:.1}% -> {tier:?}");

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("iowait"),
            tier,
            &format!(
                "I/O wait is {percent:.1}% (warning: {}%, critical: {}%)",
                ctx.config.checks.iowait.percent.warning,
                ctx.config.checks.iowait.percent.critical
            ),
            &format!("I/O wait is back to {percent:.1}%"),
        )
        .await?;

    Ok(tier.is_failure() as usize)
}

/// Aggregate cpu line from /proc/stat, all fields in ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuTicks {
    pub iowait: u64,
    pub total: u64,
}

fn read_cpu_ticks() -> anyhow::Result<CpuTicks> {
    let stat = std::fs::read_to_string("/proc/stat")?;
    parse_cpu_ticks(&stat).ok_or_else(|| anyhow::anyhow!("malformed /proc/stat"))
}

/// Parse the aggregate `cpu ` line:
/// `cpu user nice system idle iowait irq softirq steal [guest guest_nice]`
pub fn parse_cpu_ticks(stat: &str) -> Option<CpuTicks> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();

    if fields.len() < 5 {
        return None;
    }

    Some(CpuTicks {
        iowait: fields[4],
        total: fields.iter().sum(),
    })
}

/// `Δiowait / Δtotal * 100`; `None` when the clock did not advance.
pub fn iowait_percent(first: &CpuTicks, second: &CpuTicks) -> Option<f64> {
    let total_delta = second.total.checked_sub(first.total)?;
    if total_delta == 0 {
        return None;
    }
    let iowait_delta = second.iowait.saturating_sub(first.iowait);
    Some(iowait_delta as f64 / total_delta as f64 * 100.0)
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
