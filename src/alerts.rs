//! Alert dispatcher
//!
//! Turns raw check results into notifications without flooding the
//! operator. Dedup state lives in the alert state store and survives
//! process restarts; the dispatcher itself is stateless.
//!
//! ## Per-key state machine
//!
//! ```text
//! Unknown/Cleared --failure--> Alerted        (notify, start cooldown)
//! Alerted         --failure--> Alerted        (silent while cooldown runs;
//!                                              re-notify + fresh cooldown
//!                                              once it has fully expired)
//! Alerted         --success--> Unknown        (notify recovery, clear)
//! Unknown         --success--> Unknown        (no-op)
//! ```
//!
//! ## Gates, in order
//!
//! 1. Maintenance window: state still transitions, delivery is suppressed
//! 2. Per-topic notify toggle: log-only when off
//! 3. Quiet hours raise the effective floor to Critical for failure tiers
//! 4. Failure tiers below the effective minimum severity are log-only
//!
//! Clear-tier (recovery) messages skip gates 3 and 4: they resolve an
//! alert that was already loud enough to deliver. Every decision, gated
//! or not, lands in the run log.

use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;
use futures::future::join_all;
use tracing::{debug, instrument, trace, warn};

use crate::config::AlertingConfig;
use crate::maintenance::MaintenanceStore;
use crate::notify::NotificationChannel;
use crate::runlog::RunLog;
use crate::state::AlertStateStore;
use crate::{AlertKey, Notification, Severity, Topic};

/// What the dispatcher did with one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A notification went out to the channels
    Notified,
    /// Failure within an active cooldown window
    SuppressedCooldown,
    /// Maintenance window active; state updated, delivery suppressed
    SuppressedMaintenance,
    /// Per-topic notify toggle is off
    SuppressedTopic,
    /// Below the effective minimum severity (incl. quiet hours)
    SuppressedSeverity,
    /// Success result for a key that was not alerted
    NoChange,
}

pub struct AlertDispatcher {
    state: Arc<dyn AlertStateStore>,
    maintenance: Arc<dyn MaintenanceStore>,
    channels: Vec<Box<dyn NotificationChannel>>,
    runlog: Arc<RunLog>,
    config: AlertingConfig,
}

impl AlertDispatcher {
    pub fn new(
        state: Arc<dyn AlertStateStore>,
        maintenance: Arc<dyn MaintenanceStore>,
        channels: Vec<Box<dyn NotificationChannel>>,
        runlog: Arc<RunLog>,
        config: AlertingConfig,
    ) -> Self {
        Self {
            state,
            maintenance,
            channels,
            runlog,
            config,
        }
    }

    /// Bistable failure/recovery dispatch for one key.
    ///
    /// `tier` is the classification of the current sample. Failure tiers
    /// drive the alert half; `Ok` drives the recovery half with
    /// `recovery_message`.
    #[instrument(skip(self, fail_message, recovery_message), fields(key = %key))]
    pub async fn alert_once(
        &self,
        key: &AlertKey,
        tier: Severity,
        fail_message: &str,
        recovery_message: &str,
    ) -> anyhow::Result<DispatchOutcome> {
        if tier.is_failure() {
            self.dispatch_failure(key, tier, fail_message).await
        } else {
            self.alert_clear(key, recovery_message).await
        }
    }

    /// Recovery half only: clears the key and notifies iff it was alerted.
    #[instrument(skip(self, message), fields(key = %key))]
    pub async fn alert_clear(
        &self,
        key: &AlertKey,
        message: &str,
    ) -> anyhow::Result<DispatchOutcome> {
        let record = self.state.get(key).await?;
        if !record.is_alerted() {
            trace!("clear for key that was never alerted, no-op");
            return Ok(DispatchOutcome::NoChange);
        }

        self.state.clear(key).await?;
        debug!("key recovered");

        let notification = Notification::new(key.clone(), Severity::Ok, message);
        Ok(self.dispatch(notification).await)
    }

    /// Ad-hoc notification outside the per-key state machine. Runs
    /// through the same gates as everything else.
    pub async fn send_manual(
        &self,
        message: &str,
        severity: Severity,
        topic: Topic,
    ) -> anyhow::Result<DispatchOutcome> {
        let mut notification =
            Notification::new(AlertKey::from("manual"), severity, message);
        notification.topic = topic;
        Ok(self.dispatch(notification).await)
    }

    async fn dispatch_failure(
        &self,
        key: &AlertKey,
        tier: Severity,
        message: &str,
    ) -> anyhow::Result<DispatchOutcome> {
        let record = self.state.get(key).await?;
        let cooldown = chrono::Duration::minutes(self.config.cooldown_minutes as i64);

        if record.is_alerted() {
            if record.cooldown_active(chrono::Utc::now()) {
                // already alerted and inside the window: stay silent and
                // do not extend the cooldown
                trace!("failure within cooldown, suppressed");
                self.runlog.record(
                    tier,
                    "dispatch",
                    &format!("{key}: suppressed (cooldown): {message}"),
                );
                return Ok(DispatchOutcome::SuppressedCooldown);
            }

            // cooldown fully expired while the condition persists:
            // re-notify and start a fresh window
            debug!("cooldown expired while alerted, re-notifying");
            self.state.set_alerted(key, cooldown).await?;
            let notification = Notification::new(key.clone(), tier, message);
            return Ok(self.dispatch(notification).await);
        }

        let had_cooldown = record.cooldown_active(chrono::Utc::now());
        self.state.set_alerted(key, cooldown).await?;

        if had_cooldown {
            self.runlog.record(
                tier,
                "dispatch",
                &format!("{key}: suppressed (cooldown): {message}"),
            );
            return Ok(DispatchOutcome::SuppressedCooldown);
        }

        let notification = Notification::new(key.clone(), tier, message);
        Ok(self.dispatch(notification).await)
    }

    /// Run the gates, then deliver to every channel with bounded retry.
    /// The run log gets one line no matter what.
    async fn dispatch(&self, notification: Notification) -> DispatchOutcome {
        match self.maintenance.is_active().await {
            Ok(true) => {
                self.runlog.record(
                    notification.severity,
                    "dispatch",
                    &format!(
                        "{}: suppressed (maintenance): {}",
                        notification.key, notification.message
                    ),
                );
                return DispatchOutcome::SuppressedMaintenance;
            }
            Ok(false) => {}
            Err(e) => {
                // unreadable window record: fail open so real alerts get out
                warn!("maintenance gate unreadable, treating as inactive: {e}");
            }
        }

        if !self.config.topic_enabled(notification.topic) {
            self.runlog.record(
                notification.severity,
                "dispatch",
                &format!(
                    "{}: suppressed (topic {} off): {}",
                    notification.key, notification.topic, notification.message
                ),
            );
            return DispatchOutcome::SuppressedTopic;
        }

        if notification.severity != Severity::Ok {
            let floor = self.effective_floor(chrono::Local::now().hour());
            if notification.severity < floor {
                self.runlog.record(
                    notification.severity,
                    "dispatch",
                    &format!(
                        "{}: suppressed (below {floor}): {}",
                        notification.key, notification.message
                    ),
                );
                return DispatchOutcome::SuppressedSeverity;
            }
        }

        self.runlog.record(
            notification.severity,
            "dispatch",
            &format!("{}: {}", notification.key, notification.message),
        );

        self.deliver_all(&notification).await;
        DispatchOutcome::Notified
    }

    /// Effective minimum severity for the given local hour.
    fn effective_floor(&self, hour: u32) -> Severity {
        match &self.config.quiet_hours {
            Some(quiet) if quiet.contains(hour) => Severity::Critical,
            _ => self.config.min_severity,
        }
    }

    /// Fan out to every channel concurrently; one slow channel must not
    /// delay the others.
    async fn deliver_all(&self, notification: &Notification) {
        join_all(
            self.channels
                .iter()
                .map(|channel| self.deliver_with_retry(channel.as_ref(), notification)),
        )
        .await;
    }

    /// Bounded retry for one channel: fixed attempt count, fixed delay. A
    /// channel that stays down is logged and dropped, never propagated.
    async fn deliver_with_retry(
        &self,
        channel: &dyn NotificationChannel,
        notification: &Notification,
    ) {
        for attempt in 1..=self.config.delivery_attempts {
            match channel.deliver(notification).await {
                Ok(()) => {
                    trace!("{} delivered on attempt {attempt}", channel.name());
                    return;
                }
                Err(e) => {
                    warn!(
                        "{} delivery attempt {attempt}/{} failed: {e}",
                        channel.name(),
                        self.config.delivery_attempts
                    );
                    if attempt < self.config.delivery_attempts {
                        tokio::time::sleep(Duration::from_secs(self.config.delivery_delay_secs))
                            .await;
                    }
                }
            }
        }

        self.runlog.record(
            Severity::Warning,
            "dispatch",
            &format!(
                "{}: delivery via {} failed after {} attempts",
                notification.key,
                channel.name(),
                self.config.delivery_attempts
            ),
        );
    }
}
