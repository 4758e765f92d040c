//! Automation task engine
//!
//! A fixed catalog of idempotent remediation tasks. Shared contract:
//!
//! - **Dry-run is a hard guarantee**: `dry_run = true` performs zero
//!   mutating operations and still returns real metrics
//! - **Before/after measurement**: every task samples its metric before
//!   and after acting and reports the delta either way
//! - **Gating**: a task whose trigger condition does not hold reports
//!   "no action needed" as an informational completion, not a failure
//! - **Notification pair**: one start notification, exactly one
//!   completion notification; the completion is Warning when the metric
//!   did not improve (the remediation was ineffective) or a sub-step
//!   failed, else Info
//! - **Failure isolation**: a failing sub-step is logged, the remaining
//!   safe sub-steps still run, and the result reports partial success

pub mod auto_update;
pub mod disk_cleanup;
pub mod memory_relief;
pub mod snapshot_prune;
pub mod system_refresh;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::alerts::AlertDispatcher;
use crate::config::Config;
use crate::exec::CommandExecutor;
use crate::runlog::RunLog;
use crate::{Severity, Topic};

/// Everything a task needs, passed by reference.
pub struct TaskCtx {
    pub config: Config,
    pub dispatcher: AlertDispatcher,
    pub executor: Arc<dyn CommandExecutor>,
    pub runlog: Arc<RunLog>,
}

/// The fixed task catalog. Extension happens outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    DiskCleanup,
    MemoryRelief,
    SnapshotPrune,
    SystemRefresh,
    AutoUpdate,
}

impl TaskName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::DiskCleanup => "disk-cleanup",
            TaskName::MemoryRelief => "memory-relief",
            TaskName::SnapshotPrune => "snapshot-prune",
            TaskName::SystemRefresh => "system-refresh",
            TaskName::AutoUpdate => "auto-update",
        }
    }

    pub fn all() -> [TaskName; 5] {
        [
            TaskName::DiskCleanup,
            TaskName::MemoryRelief,
            TaskName::SnapshotPrune,
            TaskName::SystemRefresh,
            TaskName::AutoUpdate,
        ]
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disk-cleanup" => Ok(TaskName::DiskCleanup),
            "memory-relief" => Ok(TaskName::MemoryRelief),
            "snapshot-prune" => Ok(TaskName::SnapshotPrune),
            "system-refresh" => Ok(TaskName::SystemRefresh),
            "auto-update" => Ok(TaskName::AutoUpdate),
            other => Err(format!(
                "unknown task: {other} (expected one of: {})",
                TaskName::all().map(|t| t.as_str()).join(", ")
            )),
        }
    }
}

/// What one task invocation did. Ephemeral: consumed for the completion
/// notification and the CLI, persisted only through the run log.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationTaskResult {
    pub task_name: String,
    pub dry_run: bool,
    pub before_metric: f64,
    pub after_metric: f64,
    pub items_affected: usize,
    pub succeeded: bool,
}

/// Raw outcome handed back by a task body.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub before_metric: f64,
    pub after_metric: f64,
    pub items_affected: usize,
    /// false when a sub-step failed; the run still completed
    pub succeeded: bool,
    /// false when the trigger condition did not hold
    pub triggered: bool,
    pub summary: String,
}

impl TaskRun {
    /// "trigger condition does not hold" outcome.
    pub fn not_needed(metric: f64, summary: impl Into<String>) -> Self {
        Self {
            before_metric: metric,
            after_metric: metric,
            items_affected: 0,
            succeeded: true,
            triggered: false,
            summary: summary.into(),
        }
    }
}

/// Run one task by name: enable-flag gate, start notification, task body,
/// completion notification.
#[instrument(skip(ctx))]
pub async fn run_automation_task(
    ctx: &TaskCtx,
    task: TaskName,
    dry_run: bool,
) -> anyhow::Result<AutomationTaskResult> {
    if !task_enabled(&ctx.config, task) {
        anyhow::bail!("task {task} is disabled in the configuration");
    }

    let mode = if dry_run { " (dry-run)" } else { "" };
    info!("starting task {task}{mode}");
    ctx.runlog
        .record(Severity::Info, "automation", &format!("task {task} started{mode}"));
    ctx.dispatcher
        .send_manual(
            &format!("Automation task {task} started{mode}"),
            Severity::Info,
            Topic::Automation,
        )
        .await?;

    let run = match task {
        TaskName::DiskCleanup => disk_cleanup::run(ctx, dry_run).await?,
        TaskName::MemoryRelief => memory_relief::run(ctx, dry_run).await?,
        TaskName::SnapshotPrune => snapshot_prune::run(ctx, dry_run).await?,
        TaskName::SystemRefresh => system_refresh::run(ctx, dry_run).await?,
        TaskName::AutoUpdate => auto_update::run(ctx, dry_run).await?,
    };

    let severity = completion_severity(&run, dry_run);
    let message = format!(
        "Automation task {task} finished{mode}: {} (metric {:.1} -> {:.1}, {} item(s))",
        run.summary, run.before_metric, run.after_metric, run.items_affected
    );

    ctx.runlog.record(severity, "automation", &message);
    ctx.dispatcher
        .send_manual(&message, severity, Topic::Automation)
        .await?;

    Ok(AutomationTaskResult {
        task_name: task.to_string(),
        dry_run,
        before_metric: run.before_metric,
        after_metric: run.after_metric,
        items_affected: run.items_affected,
        succeeded: run.succeeded,
    })
}

/// Warning when a sub-step failed or a real (non-dry) remediation did not
/// move its metric; Info otherwise.
fn completion_severity(run: &TaskRun, dry_run: bool) -> Severity {
    if !run.succeeded {
        return Severity::Warning;
    }
    if dry_run || !run.triggered {
        return Severity::Info;
    }
    if run.after_metric >= run.before_metric {
        Severity::Warning
    } else {
        Severity::Info
    }
}

fn task_enabled(config: &Config, task: TaskName) -> bool {
    match task {
        TaskName::DiskCleanup => config.automation.disk_cleanup.enabled,
        TaskName::MemoryRelief => config.automation.memory_relief.enabled,
        TaskName::SnapshotPrune => config.automation.snapshot_prune.enabled,
        TaskName::SystemRefresh => config.automation.system_refresh.enabled,
        TaskName::AutoUpdate => config.automation.auto_update.enabled,
    }
}

/// Current usage percent of the filesystem holding `/`, the shared
/// trigger metric for the disk-oriented tasks.
pub(crate) fn root_usage_percent() -> anyhow::Result<f64> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let root = disks
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .ok_or_else(|| anyhow::anyhow!("root filesystem not found"))?;

    let total = root.total_space();
    if total == 0 {
        anyhow::bail!("root filesystem reports zero size");
    }
    Ok((total - root.available_space()) as f64 / total as f64 * 100.0)
}

pub(crate) fn memory_usage_percent() -> f64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    if sys.total_memory() == 0 {
        return 0.0;
    }
    sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(before: f64, after: f64, triggered: bool, succeeded: bool) -> TaskRun {
        TaskRun {
            before_metric: before,
            after_metric: after,
            items_affected: 1,
            succeeded,
            triggered,
            summary: String::new(),
        }
    }

    #[test]
    fn improvement_completes_as_info() {
        assert_eq!(
            completion_severity(&run(90.0, 70.0, true, true), false),
            Severity::Info
        );
    }

    #[test]
    fn ineffective_remediation_completes_as_warning() {
        assert_eq!(
            completion_severity(&run(90.0, 90.0, true, true), false),
            Severity::Warning
        );
        assert_eq!(
            completion_severity(&run(90.0, 92.0, true, true), false),
            Severity::Warning
        );
    }

    #[test]
    fn dry_run_and_not_needed_complete_as_info() {
        assert_eq!(
            completion_severity(&run(90.0, 90.0, true, true), true),
            Severity::Info
        );
        assert_eq!(
            completion_severity(&run(50.0, 50.0, false, true), false),
            Severity::Info
        );
    }

    #[test]
    fn substep_failure_completes_as_warning() {
        assert_eq!(
            completion_severity(&run(90.0, 70.0, true, false), false),
            Severity::Warning
        );
    }

    #[test]
    fn task_names_round_trip() {
        for task in TaskName::all() {
            assert_eq!(task.as_str().parse::<TaskName>().unwrap(), task);
        }
        assert!("make-coffee".parse::<TaskName>().is_err());
    }
}
