//! Email delivery adapter (SMTP)

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use super::{DeliveryError, NotificationChannel};
use crate::Notification;
use crate::config::EmailConfig;

pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
            &self.config.smtp_host,
        )
        .map_err(|e| DeliveryError::Smtp(e.to_string()))?
        .port(self.config.smtp_port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    #[instrument(skip(self, notification), fields(key = %notification.key))]
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let subject = format!(
            "[{}] {} on {}",
            notification.severity.as_str().to_uppercase(),
            notification.topic,
            notification.hostname
        );
        let body = format!(
            "{}\n\nKey: {}\nSeverity: {}\nTime: {}",
            notification.message,
            notification.key,
            notification.severity,
            notification.timestamp.to_rfc3339()
        );

        let from: lettre::message::Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| DeliveryError::InvalidMessage(format!("from address: {e}")))?;

        let transport = self.transport()?;

        for recipient in &self.config.to {
            let to = recipient
                .parse()
                .map_err(|e| DeliveryError::InvalidMessage(format!("to address: {e}")))?;

            let email = Message::builder()
                .from(from.clone())
                .to(to)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| DeliveryError::InvalidMessage(e.to_string()))?;

            transport
                .send(email)
                .await
                .map_err(|e| DeliveryError::Smtp(e.to_string()))?;
        }

        debug!("email submitted to {} recipient(s)", self.config.to.len());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
