//! Local syslog delivery adapter
//!
//! Writes RFC3164 datagrams straight to the local syslog socket. Kept
//! deliberately minimal: daemon facility, tag `warden`, one line per
//! notification.

use std::os::unix::net::UnixDatagram;

use async_trait::async_trait;
use tracing::debug;

use super::{DeliveryError, NotificationChannel};
use crate::config::SyslogConfig;
use crate::{Notification, Severity};

const FACILITY_DAEMON: u8 = 3;

pub struct SyslogChannel {
    config: SyslogConfig,
}

impl SyslogChannel {
    pub fn new(config: SyslogConfig) -> Self {
        Self { config }
    }
}

fn priority(severity: Severity) -> u8 {
    // RFC3164 severity codes
    let code = match severity {
        Severity::Critical => 2,
        Severity::Warning => 4,
        Severity::Ok => 5,
        Severity::Info => 6,
    };
    FACILITY_DAEMON * 8 + code
}

#[async_trait]
impl NotificationChannel for SyslogChannel {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let line = format!(
            "<{}>warden[{}]: [{}] {}: {}",
            priority(notification.severity),
            std::process::id(),
            notification.topic,
            notification.key,
            notification.message
        );

        let socket = UnixDatagram::unbound()?;
        socket.send_to(line.as_bytes(), &self.config.socket)?;

        debug!("syslog datagram written");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "syslog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlertKey;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn priority_encodes_facility_and_severity() {
        assert_eq!(priority(Severity::Critical), 26);
        assert_eq!(priority(Severity::Warning), 28);
        assert_eq!(priority(Severity::Info), 30);
        assert_eq!(priority(Severity::Ok), 29);
    }

    #[tokio::test]
    async fn delivers_datagram_to_bound_socket() {
        let dir = TempDir::new().unwrap();
        let socket_path = dir.path().join("log");
        let receiver = UnixDatagram::bind(&socket_path).unwrap();

        let channel = SyslogChannel::new(SyslogConfig {
            enabled: true,
            socket: socket_path,
        });
        let notification =
            Notification::new(AlertKey::from("svc-sshd"), Severity::Critical, "sshd down");
        channel.deliver(&notification).await.unwrap();

        let mut buf = [0u8; 1024];
        let len = receiver.recv(&mut buf).unwrap();
        let line = String::from_utf8_lossy(&buf[..len]);
        assert!(line.starts_with("<26>warden["));
        assert!(line.contains("svc-sshd"));
        assert!(line.contains("sshd down"));
    }

    #[tokio::test]
    async fn missing_socket_is_a_delivery_error() {
        let channel = SyslogChannel::new(SyslogConfig {
            enabled: true,
            socket: PathBuf::from("/nonexistent/socket/path"),
        });
        let notification =
            Notification::new(AlertKey::from("svc-sshd"), Severity::Info, "probe");
        assert!(channel.deliver(&notification).await.is_err());
    }
}
