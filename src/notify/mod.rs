//! Notification channels
//!
//! Delivery adapters behind one narrow contract: the dispatcher hands a
//! [`Notification`] to every configured channel and treats delivery
//! failures as local-log events, never as check failures. Dedup and
//! rate-limiting happen upstream in the dispatcher; channels may be called
//! repeatedly with identical arguments (at-least-once delivery).
//!
//! ## Adapters
//!
//! - **Webhook**: JSON POST (reqwest)
//! - **Email**: SMTP (lettre)
//! - **Syslog**: RFC3164 datagram to the local socket

pub mod email;
pub mod syslog;
pub mod webhook;

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::Notification;
use crate::config::ChannelsConfig;

/// Errors surfaced by a delivery attempt
#[derive(Debug)]
pub enum DeliveryError {
    /// Webhook endpoint unreachable or returned a failure status
    Http(String),

    /// SMTP submission failed
    Smtp(String),

    /// Local socket or file error
    IoError(std::io::Error),

    /// The notification could not be rendered for this channel
    InvalidMessage(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Http(msg) => write!(f, "webhook delivery failed: {}", msg),
            DeliveryError::Smtp(msg) => write!(f, "email delivery failed: {}", msg),
            DeliveryError::IoError(err) => write!(f, "I/O error: {}", err),
            DeliveryError::InvalidMessage(msg) => write!(f, "invalid message: {}", msg),
        }
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeliveryError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DeliveryError {
    fn from(err: std::io::Error) -> Self {
        DeliveryError::IoError(err)
    }
}

/// Delivery adapter contract.
///
/// Implementations apply their own transport-level handling but no retry;
/// the dispatcher owns the bounded retry loop.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;

    fn name(&self) -> &'static str;
}

/// Build the channel set from configuration. An empty set is valid: the
/// run log still captures everything.
pub fn build_channels(config: &ChannelsConfig) -> Vec<Box<dyn NotificationChannel>> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

    if let Some(webhook) = &config.webhook {
        channels.push(Box::new(webhook::WebhookChannel::new(webhook.clone())));
    }
    if let Some(email) = &config.email {
        channels.push(Box::new(email::EmailChannel::new(email.clone())));
    }
    if config.syslog.enabled {
        channels.push(Box::new(syslog::SyslogChannel::new(config.syslog.clone())));
    }

    channels
}

/// Forwarding wrapper so a channel can be both handed to the dispatcher
/// (which takes ownership) and inspected afterwards.
pub struct SharedChannel(pub std::sync::Arc<dyn NotificationChannel>);

#[async_trait]
impl NotificationChannel for SharedChannel {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.0.deliver(notification).await
    }

    fn name(&self) -> &'static str {
        "shared"
    }
}

/// Recording channel for tests: captures every delivered notification and
/// can be scripted to fail the first N attempts.
pub struct RecordingChannel {
    delivered: Mutex<Vec<Notification>>,
    fail_first: Mutex<u32>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail_first: Mutex::new(0),
        }
    }

    pub fn failing_first(attempts: u32) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail_first: Mutex::new(attempts),
        }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let mut remaining = self.fail_first.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(DeliveryError::Http("scripted failure".to_string()));
        }
        drop(remaining);

        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
