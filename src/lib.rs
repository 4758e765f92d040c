pub mod alerts;
pub mod automation;
pub mod checks;
pub mod config;
pub mod exec;
pub mod lock;
pub mod maintenance;
pub mod notify;
pub mod runlog;
pub mod state;
pub mod thresholds;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for one monitored condition instance.
///
/// Keys are lowercase, dash-separated, and start with a topic prefix,
/// e.g. `svc-pveproxy`, `disk-root`, `zfs-cap-rpool`, `iface-rx-eth0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertKey(String);

impl AlertKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First dash-delimited segment, used for topic routing.
    pub fn prefix(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    pub fn topic(&self) -> Topic {
        Topic::for_key(self)
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AlertKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Message severity. The derived ordering drives escalation and
/// minimum-severity filtering; `Ok` is the synthetic clear tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// True for the tiers that represent a failing condition.
    pub fn is_failure(&self) -> bool {
        matches!(self, Severity::Warning | Severity::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ok" => Ok(Severity::Ok),
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" | "crit" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Coarse alert category used for per-topic notification toggles.
///
/// Every [`AlertKey`] maps to exactly one topic via [`Topic::for_key`],
/// a total function over the key's first segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Services,
    Disk,
    Zfs,
    Memory,
    Cpu,
    Network,
    Ssh,
    Events,
    Temps,
    Backups,
    Updates,
    Vms,
    Automation,
    General,
}

impl Topic {
    /// Total mapping from key prefix to topic, with `General` as the
    /// fallback arm for anything unrecognized.
    pub fn for_key(key: &AlertKey) -> Topic {
        match key.prefix() {
            "svc" => Topic::Services,
            "disk" => Topic::Disk,
            "zfs" | "pool" => Topic::Zfs,
            "mem" | "swap" | "oom" => Topic::Memory,
            "cpu" | "load" | "iowait" => Topic::Cpu,
            "net" | "iface" => Topic::Network,
            "ssh" => Topic::Ssh,
            "journal" | "events" => Topic::Events,
            "temp" => Topic::Temps,
            "backup" => Topic::Backups,
            "updates" => Topic::Updates,
            "vm" | "ct" => Topic::Vms,
            "task" => Topic::Automation,
            _ => Topic::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Services => "services",
            Topic::Disk => "disk",
            Topic::Zfs => "zfs",
            Topic::Memory => "memory",
            Topic::Cpu => "cpu",
            Topic::Network => "network",
            Topic::Ssh => "ssh",
            Topic::Events => "events",
            Topic::Temps => "temps",
            Topic::Backups => "backups",
            Topic::Updates => "updates",
            Topic::Vms => "vms",
            Topic::Automation => "automation",
            Topic::General => "general",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let topic = match s.to_ascii_lowercase().as_str() {
            "services" => Topic::Services,
            "disk" => Topic::Disk,
            "zfs" => Topic::Zfs,
            "memory" => Topic::Memory,
            "cpu" => Topic::Cpu,
            "network" => Topic::Network,
            "ssh" => Topic::Ssh,
            "events" => Topic::Events,
            "temps" => Topic::Temps,
            "backups" => Topic::Backups,
            "updates" => Topic::Updates,
            "vms" => Topic::Vms,
            "automation" => Topic::Automation,
            "general" => Topic::General,
            other => return Err(format!("unknown topic: {other}")),
        };
        Ok(topic)
    }
}

/// A notification on its way to the delivery channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub key: AlertKey,
    pub severity: Severity,
    pub topic: Topic,
    pub message: String,
    pub hostname: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Notification {
    pub fn new(key: AlertKey, severity: Severity, message: impl Into<String>) -> Self {
        let topic = key.topic();
        Self {
            key,
            severity,
            topic,
            message: message.into(),
            hostname: hostname(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Best-effort hostname for message headers; "unknown" if unavailable.
pub fn hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_mapping_is_total_over_known_prefixes() {
        let cases = [
            ("svc-pveproxy", Topic::Services),
            ("disk-root", Topic::Disk),
            ("zfs-cap-rpool", Topic::Zfs),
            ("pool-health-rpool", Topic::Zfs),
            ("mem-usage", Topic::Memory),
            ("swap-usage", Topic::Memory),
            ("oom-events", Topic::Memory),
            ("load-avg", Topic::Cpu),
            ("iowait", Topic::Cpu),
            ("net-connectivity", Topic::Network),
            ("iface-rx-eth0", Topic::Network),
            ("ssh-bruteforce", Topic::Ssh),
            ("journal-critical", Topic::Events),
            ("temp-cpu", Topic::Temps),
            ("backup-freshness", Topic::Backups),
            ("updates-pending", Topic::Updates),
            ("vm-101", Topic::Vms),
            ("ct-202", Topic::Vms),
            ("task-disk-cleanup", Topic::Automation),
        ];

        for (key, expected) in cases {
            assert_eq!(Topic::for_key(&AlertKey::from(key)), expected, "key {key}");
        }
    }

    #[test]
    fn unknown_prefix_falls_back_to_general() {
        assert_eq!(
            Topic::for_key(&AlertKey::from("frobnicator")),
            Topic::General
        );
        assert_eq!(Topic::for_key(&AlertKey::from("x-y-z")), Topic::General);
        assert_eq!(Topic::for_key(&AlertKey::from("")), Topic::General);
    }

    #[test]
    fn severity_ordering_drives_escalation() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert!(Severity::Critical.is_failure());
        assert!(Severity::Warning.is_failure());
        assert!(!Severity::Info.is_failure());
        assert!(!Severity::Ok.is_failure());
    }

    #[test]
    fn severity_parses_from_str() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("CRIT".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("bogus".parse::<Severity>().is_err());
    }
}
