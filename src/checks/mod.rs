//! Health check engine
//!
//! A catalog of independent check units, each a thin
//! sample → classify → dispatch pass. Checks run sequentially so later
//! checks observe earlier side effects (a restarted service is visible to
//! anything that depends on it), and a single failing check never aborts
//! the run.
//!
//! Dedup is entirely the dispatcher's job: running a check twice in a row
//! must not double-alert.

pub mod backups;
pub mod cpu;
pub mod disk;
pub mod events;
pub mod memory;
pub mod network;
pub mod security;
pub mod services;
pub mod temps;
pub mod updates;
pub mod vms;
pub mod zfs;

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::Severity;
use crate::alerts::AlertDispatcher;
use crate::config::Config;
use crate::exec::CommandExecutor;
use crate::maintenance::MaintenanceStore;
use crate::runlog::RunLog;
use crate::state::{AlertStateStore, BaselineStore};

/// Everything a check unit needs, passed by reference. No ambient state.
pub struct CheckCtx {
    pub config: Config,
    pub dispatcher: AlertDispatcher,
    pub state: Arc<dyn AlertStateStore>,
    pub baselines: Arc<dyn BaselineStore>,
    pub maintenance: Arc<dyn MaintenanceStore>,
    pub executor: Arc<dyn CommandExecutor>,
    pub runlog: Arc<RunLog>,
}

/// Run every enabled check. Returns the number of checks that reported at
/// least one issue; the caller uses it as the process exit status
/// (0 = fully clean).
///
/// An active maintenance window short-circuits the whole run before any
/// check executes.
#[instrument(skip(ctx))]
pub async fn run_all_health_checks(ctx: &CheckCtx) -> anyhow::Result<usize> {
    if ctx.maintenance.is_active().await.unwrap_or(false) {
        info!("maintenance window active, skipping health checks");
        ctx.runlog
            .record(Severity::Info, "checks", "run skipped (maintenance)");
        return Ok(0);
    }

    match ctx
        .state
        .sweep_stale(ctx.config.alerting.retention_days)
        .await
    {
        Ok(0) => {}
        Ok(n) => debug!("swept {n} stale alert records"),
        Err(e) => warn!("alert state sweep failed: {e}"),
    }

    ctx.runlog.record(Severity::Info, "checks", "run started");

    let checks = &ctx.config.checks;
    let mut failing = 0usize;

    macro_rules! run_check {
        ($name:literal, $enabled:expr, $check:expr) => {
            if $enabled {
                failing += run_one(ctx, $name, || $check).await;
            } else {
                debug!("check {} disabled, skipping", $name);
            }
        };
    }

    run_check!("services", checks.services.enabled, services::run(ctx));
    run_check!("disk", checks.disk.enabled, disk::run(ctx));
    run_check!("zfs", checks.zfs.enabled, zfs::run(ctx));
    run_check!("memory", checks.memory.enabled, memory::run(ctx));
    run_check!("load", checks.load.enabled, cpu::run_load(ctx));
    run_check!("iowait", checks.iowait.enabled, cpu::run_iowait(ctx));
    run_check!("network", checks.network.enabled, network::run(ctx));
    run_check!("ssh", checks.ssh.enabled, security::run(ctx));
    run_check!("events", checks.events.enabled, events::run(ctx));
    run_check!("temps", checks.temps.enabled, temps::run(ctx));
    run_check!("backups", checks.backups.enabled, backups::run(ctx));
    run_check!("updates", checks.updates.enabled, updates::run(ctx));
    run_check!("vms", checks.vms.enabled, vms::run(ctx));

    ctx.runlog.record(
        Severity::Info,
        "checks",
        &format!("run finished: {failing} check(s) with issues"),
    );
    Ok(failing)
}

/// Execute one check under the retry policy and fold its result into the
/// checks-with-issues count (0 or 1).
async fn run_one<F, Fut>(ctx: &CheckCtx, name: &str, check: F) -> usize
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<usize>>,
{
    match run_with_retry(name, check).await {
        Ok(0) => {
            debug!("check {name}: clean");
            0
        }
        Ok(issues) => {
            ctx.runlog.record(
                Severity::Warning,
                "checks",
                &format!("check {name}: {issues} issue(s)"),
            );
            1
        }
        Err(e) => {
            // sampling failure counts as an issue, never a silent pass
            warn!("check {name} failed to sample: {e:#}");
            ctx.runlog.record(
                Severity::Warning,
                "checks",
                &format!("check {name}: sampling failed: {e:#}"),
            );
            1
        }
    }
}

/// Retry-once-with-jitter: on failure, sleep a randomized 1–3 s, then
/// attempt exactly once more. The jitter keeps a fleet of nodes whose
/// schedulers tick together from hammering a shared dependency in
/// lockstep.
pub async fn run_with_retry<F, Fut>(name: &str, check: F) -> anyhow::Result<usize>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<usize>>,
{
    match check().await {
        Ok(result) => Ok(result),
        Err(first) => {
            let jitter_ms = rand::thread_rng().gen_range(1000..=3000);
            warn!("check {name} failed ({first:#}), retrying in {jitter_ms}ms");
            tokio::time::sleep(std::time::Duration::from_millis(jitter_ms)).await;
            check().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt() {
        let attempts = AtomicUsize::new(0);

        let result = run_with_retry("flaky", || async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("transient blip");
            }
            Ok(0)
        })
        .await;

        assert_eq!(result.unwrap(), 0);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_second_failure() {
        let attempts = AtomicUsize::new(0);

        let result: anyhow::Result<usize> = run_with_retry("dead", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("still broken");
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_on_first_success() {
        let attempts = AtomicUsize::new(0);

        let result = run_with_retry("steady", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
