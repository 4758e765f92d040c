//! System refresh task
//!
//! Package-cache clean, journal vacuum, and a restart of the configured
//! service list. Always triggered; the metric is root filesystem usage.

use tracing::{debug, warn};

use super::{TaskCtx, TaskRun, root_usage_percent};

pub async fn run(ctx: &TaskCtx, dry_run: bool) -> anyhow::Result<TaskRun> {
    let config = &ctx.config.automation.system_refresh;
    let before = root_usage_percent()?;

    let vacuum_arg = format!("--vacuum-time={}", config.journal_vacuum);
    let mut steps: Vec<(&str, Vec<&str>)> = vec![
        ("apt-get", vec!["clean"]),
        ("journalctl", vec![vacuum_arg.as_str()]),
    ];
    for service in &config.services {
        steps.push(("systemctl", vec!["restart", service.as_str()]));
    }

    if dry_run {
        let summaries: Vec<String> = steps
            .iter()
            .map(|(program, args)| format!("{program} {}", args.join(" ")))
            .collect();
        return Ok(TaskRun {
            before_metric: before,
            after_metric: before,
            items_affected: steps.len(),
            succeeded: true,
            triggered: true,
            summary: format!("would run: {}", summaries.join(", ")),
        });
    }

    let mut completed = 0usize;
    let mut errors = 0usize;

    for (program, args) in &steps {
        match ctx.executor.run(program, args).await {
            Ok(output) if output.success() => {
                debug!("{program} {} ok", args.join(" "));
                completed += 1;
            }
            Ok(output) => {
                warn!("{program} {} failed: {}", args.join(" "), output.stderr.trim());
                errors += 1;
            }
            Err(e) => {
                warn!("{program} {} failed: {e:#}", args.join(" "));
                errors += 1;
            }
        }
    }

    let after = root_usage_percent()?;

    Ok(TaskRun {
        before_metric: before,
        after_metric: after,
        items_affected: completed,
        succeeded: errors == 0,
        triggered: true,
        summary: format!("{completed}/{} step(s) completed, {errors} error(s)", steps.len()),
    })
}
