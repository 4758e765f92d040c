//! systemd service check
//!
//! For each monitored unit: inactive → alert and attempt one restart.
//! A successful restart clears the key immediately; a failed restart
//! leaves the key alerted for the next cycle to reconcile.

use tracing::{debug, info, warn};

use super::CheckCtx;
use crate::{AlertKey, Severity};

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let mut issues = 0;

    for unit in &ctx.config.checks.services.units {
        let key = AlertKey::new(format!("svc-{unit}"));

        if is_active(ctx, unit).await? {
            ctx.dispatcher
                .alert_clear(&key, &format!("Service {unit} is active again"))
                .await?;
            continue;
        }

        issues += 1;
        ctx.dispatcher
            .alert_once(
                &key,
                Severity::Critical,
                &format!("Service {unit} is not active"),
                &format!("Service {unit} is active again"),
            )
            .await?;

        if !ctx.config.checks.services.restart {
            continue;
        }

        info!("attempting restart of {unit}");
        let restart = ctx.executor.run("systemctl", &["restart", unit]).await?;
        if restart.success() && is_active(ctx, unit).await? {
            info!("{unit} restarted successfully");
            ctx.dispatcher
                .alert_clear(&key, &format!("Service {unit} restarted successfully"))
                .await?;
        } else {
            warn!("restart of {unit} did not bring it back: {}", restart.stderr.trim());
        }
    }

    Ok(issues)
}

async fn is_active(ctx: &CheckCtx, unit: &str) -> anyhow::Result<bool> {
    let output = ctx.executor.run("systemctl", &["is-active", unit]).await?;
    let state = output.stdout.trim();
    debug!("{unit}: {state}");
    Ok(output.success() && state == "active")
}
