//! Webhook delivery adapter

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use super::{DeliveryError, NotificationChannel};
use crate::Notification;
use crate::config::WebhookConfig;

pub struct WebhookChannel {
    client: Client,
    config: WebhookConfig,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    #[instrument(skip(self, notification), fields(key = %notification.key))]
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let payload = json!({
            "message": notification.message,
            "severity": notification.severity,
            "topic": notification.topic,
            "key": notification.key,
            "host": notification.hostname,
            "timestamp": notification.timestamp.to_rfc3339(),
        });

        let mut request = self.client.post(&self.config.url).json(&payload);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        if response.status().is_success() {
            debug!("webhook accepted notification");
            Ok(())
        } else {
            Err(DeliveryError::Http(format!(
                "endpoint returned {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
