//! VM/CT lifecycle check
//!
//! Persists the set of running guests and alerts when a guest that was
//! running at the previous sample no longer is. The first run only
//! establishes the baseline; a guest coming back clears its key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::CheckCtx;
use crate::{AlertKey, Severity};

const BASELINE: &str = "guest-running-set";

/// id → name of running guests
pub type RunningSet = BTreeMap<u32, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestBaseline {
    pub vms: RunningSet,
    pub cts: RunningSet,
}

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let vms = sample(ctx, "qm").await?;
    let cts = if ctx.config.checks.vms.containers {
        sample(ctx, "pct").await?
    } else {
        None
    };

    let previous: Option<GuestBaseline> = match ctx.baselines.load(BASELINE).await? {
        Some(value) => serde_json::from_value(value).ok(),
        None => None,
    };

    // keep the old set for any tool that was unavailable this run, so a
    // missing binary never reads as "every guest stopped"
    let mut next = previous.clone().unwrap_or_default();
    if let Some(vms) = &vms {
        next.vms = vms.clone();
    }
    if let Some(cts) = &cts {
        next.cts = cts.clone();
    }
    ctx.baselines
        .store(BASELINE, serde_json::to_value(&next)?)
        .await?;

    let Some(previous) = previous else {
        debug!("no guest baseline yet, establishing one");
        return Ok(0);
    };

    let mut issues = 0;
    if let Some(vms) = &vms {
        issues += reconcile(ctx, "vm", "VM", &previous.vms, vms).await?;
    }
    if let Some(cts) = &cts {
        issues += reconcile(ctx, "ct", "Container", &previous.cts, cts).await?;
    }

    Ok(issues)
}

/// Alert on disappeared guests, clear reappeared ones.
async fn reconcile(
    ctx: &CheckCtx,
    prefix: &str,
    kind: &str,
    previous: &RunningSet,
    current: &RunningSet,
) -> anyhow::Result<usize> {
    let mut issues = 0;

    for (id, name) in stopped_since(previous, current) {
        let key = AlertKey::new(format!("{prefix}-{id}"));
        trace!("{key}: {kind} {name} no longer running");
        issues += 1;
        ctx.dispatcher
            .alert_once(
                &key,
                Severity::Warning,
                &format!("{kind} {id} ({name}) is no longer running"),
                &format!("{kind} {id} ({name}) is running again"),
            )
            .await?;
    }

    for (id, name) in current {
        let key = AlertKey::new(format!("{prefix}-{id}"));
        ctx.dispatcher
            .alert_clear(&key, &format!("{kind} {id} ({name}) is running again"))
            .await?;
    }

    Ok(issues)
}

/// Guests running at the previous sample but not at the current one.
pub fn stopped_since(previous: &RunningSet, current: &RunningSet) -> Vec<(u32, String)> {
    previous
        .iter()
        .filter(|(id, _)| !current.contains_key(id))
        .map(|(id, name)| (*id, name.clone()))
        .collect()
}

/// `None` when the management tool is not installed on this host.
async fn sample(ctx: &CheckCtx, tool: &str) -> anyhow::Result<Option<RunningSet>> {
    let output = match ctx.executor.run(tool, &["list"]).await {
        Ok(output) => output,
        Err(e) => {
            debug!("{tool} unavailable, skipping: {e:#}");
            return Ok(None);
        }
    };
    if !output.success() {
        anyhow::bail!("{tool} list failed: {}", output.stderr.trim());
    }

    Ok(Some(match tool {
        "pct" => parse_pct_list(&output.stdout),
        _ => parse_qm_list(&output.stdout),
    }))
}

/// `qm list`: `VMID NAME STATUS MEM(MB) BOOTDISK(GB) PID`
pub fn parse_qm_list(stdout: &str) -> RunningSet {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id: u32 = fields.next()?.parse().ok()?;
            let name = fields.next()?.to_string();
            let status = fields.next()?;
            (status == "running").then_some((id, name))
        })
        .collect()
}

/// `pct list`: `VMID Status Lock Name` (lock column may be empty)
pub fn parse_pct_list(stdout: &str) -> RunningSet {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id: u32 = fields.next()?.parse().ok()?;
            let status = fields.next()?;
            let name = fields.last().unwrap_or("unnamed").to_string();
            (status == "running").then_some((id, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QM_LIST: &str = "      VMID NAME                 STATUS     MEM(MB)    BOOTDISK(GB) PID\n\
                                  101 web01                running    2048              32.00 1234\n\
                                  102 db01                 stopped    4096              64.00 0\n";

    const PCT_LIST: &str = "VMID       Status     Lock         Name\n\
                            201        running                 proxy\n\
                            202        stopped                 spare\n";

    #[test]
    fn qm_list_keeps_only_running() {
        let set = parse_qm_list(QM_LIST);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&101).unwrap(), "web01");
    }

    #[test]
    fn pct_list_keeps_only_running() {
        let set = parse_pct_list(PCT_LIST);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&201).unwrap(), "proxy");
    }

    #[test]
    fn header_lines_are_ignored() {
        assert!(parse_qm_list("VMID NAME STATUS\n").is_empty());
    }

    #[test]
    fn stopped_since_reports_disappeared_guests() {
        let mut previous = RunningSet::new();
        previous.insert(101, "web01".to_string());
        previous.insert(102, "db01".to_string());

        let mut current = RunningSet::new();
        current.insert(101, "web01".to_string());

        assert_eq!(
            stopped_since(&previous, &current),
            vec![(102, "db01".to_string())]
        );
        assert!(stopped_since(&current, &current).is_empty());
    }
}
