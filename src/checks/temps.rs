//! Component temperature check
//!
//! Alerts on the hottest sensor; boards without readable sensors pass
//! clean.

use sysinfo::Components;
use tracing::trace;

use super::CheckCtx;
use crate::AlertKey;

pub async fn run(ctx: &CheckCtx) -> anyhow::Result<usize> {
    let components = Components::new_with_refreshed_list();

    let hottest = components
        .iter()
        .filter_map(|c| c.temperature().map(|t| (c.label().to_string(), t)))
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let Some((label, temperature)) = hottest else {
        trace!("no temperature sensors available");
        return Ok(0);
    };

    let tier = ctx.config.checks.temps.celsius.classify(temperature as f64);
    trace!("hottest component {label}: {temperature:.1}°C -> {tier:?}");

    ctx.dispatcher
        .alert_once(
            &AlertKey::from("temp-max"),
            tier,
            &format!(
                "Component {label} is at {temperature:.1}°C (warning: {}°C, critical: {}°C)",
                ctx.config.checks.temps.celsius.warning, ctx.config.checks.temps.celsius.critical
            ),
            &format!("Temperatures are back to normal (hottest: {label} at {temperature:.1}°C)"),
        )
        .await?;

    Ok(tier.is_failure() as usize)
}
