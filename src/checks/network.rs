//! Network checks: connectivity probe and interface error-counter deltas.
//!
//! The kernel's per-interface error counters are cumulative, so the check
//! persists the previous sample and alerts on the delta between runs. The
//! first run after install only establishes the baseline; a counter lower
//! than its baseline (reboot, counter reset) re-baselines silently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sysinfo::Networks;
use tracing::{debug, trace};

use super::CheckCtx;
use crate::{AlertKey, Severity};

const BASELINE: &str = "iface-errors";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub rx_errors: u64,
    pub tx_errors: u64,
}

pub type CounterMap = BTreeMap<String, InterfaceCounters>;

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let mut issues = connectivity(ctx).await?;
    issues += interface_errors(ctx).await?;
    Ok(issues)
}

async fn connectivity(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let target = &ctx.config.checks.network.ping_target;
    let output = ctx
        .executor
        .run("ping", &["-c", "1", "-W", "2", target])
        .await?;

    let tier = if output.success() {
        Severity::Ok
    } else {
        Severity::Critical
    };
    trace!("ping {target}: {}", if output.success() { "ok" } else { "failed" });

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("net-connectivity"),
            tier,
            &format!("Connectivity probe to {target} failed"),
            &format!("Connectivity to {target} restored"),
        )
        .await?;

    Ok(tier.is_failure() as usize)
}

async fn interface_errors(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let networks = Networks::new_with_refreshed_list();
    let current: CounterMap = networks
        .iter()
        .filter(|(name, _)| !skip_interface(name, &ctx.config.checks.network.ignore_interfaces))
        .map(|(name, data)| {
            (
                name.clone(),
                InterfaceCounters {
                    rx_errors: data.total_errors_on_received(),
                    tx_errors: data.total_errors_on_transmitted(),
                },
            )
        })
        .collect();

    let previous: Option<CounterMap> = match ctx.baselines.load(BASELINE).await? {
        Some(value) => serde_json::from_value(value).ok(),
        None => None,
    };

    ctx.baselines
        .store(BASELINE, serde_json::to_value(&current)?)
        .await?;

    let Some(previous) = previous else {
        debug!("no interface-error baseline yet, establishing one");
        return Ok(0);
    };

    let mut issues = 0;

    for (iface, counters) in &current {
        let Some(prev) = previous.get(iface) else {
            // newly appeared interface, baseline only
            continue;
        };

        for (direction, now, before) in [
            ("rx", counters.rx_errors, prev.rx_errors),
            ("tx", counters.tx_errors, prev.tx_errors),
        ] {
            let Some(delta) = now.checked_sub(before) else {
                debug!("{iface} {direction} error counter went backwards, re-baselining");
                continue;
            };

            let key = AlertKey::new(format!("iface-{direction}-{iface}"));
            let tier = ctx.config.checks.network.iface_errors.classify(delta as f64);
            trace!("{key}: +{delta} errors -> {tier:?}");

            if tier.is_failure() {
                issues += 1;
            }
            ctx.dispatcher
                .alert_once(
                    &key,
                    tier,
                    &format!("Interface {iface} logged {delta} new {direction} errors since last run"),
                    &format!("Interface {iface} {direction} error rate is back to normal"),
                )
                .await?;
        }
    }

    Ok(issues)
}

fn skip_interface(name: &str, ignored: &[String]) -> bool {
    name == "lo" || ignored.iter().any(|i| i == name)
}
