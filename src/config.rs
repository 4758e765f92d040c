use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::thresholds::ThresholdPair;
use crate::{Severity, Topic};

/// Immutable agent configuration, assembled once at process start by
/// merging compiled-in defaults, the base config file, and an optional
/// local override file (`<name>.local.json`), rightmost layer winning.
///
/// Passed by reference into every component; nothing reads configuration
/// ambiently after startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub alerting: AlertingConfig,

    #[serde(default)]
    pub channels: ChannelsConfig,

    #[serde(default)]
    pub checks: ChecksConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    /// Upper bound for any single external command invocation.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// State directory: alert records, baselines, maintenance window, run lock
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Log directory: append-only structured run log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertingConfig {
    /// Minimum interval between repeated failure notifications per key
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    /// Alert-state records untouched for this many days are swept
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Messages below this tier are logged locally but not delivered
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,

    /// While active, only Critical failure messages are delivered
    pub quiet_hours: Option<QuietHours>,

    /// Per-topic notify toggles, keyed by topic name; absent = enabled
    #[serde(default)]
    pub topics: HashMap<String, bool>,

    #[serde(default = "default_delivery_attempts")]
    pub delivery_attempts: u32,

    #[serde(default = "default_delivery_delay_secs")]
    pub delivery_delay_secs: u64,
}

impl AlertingConfig {
    /// Per-topic notify toggle; topics not mentioned in the config are on.
    pub fn topic_enabled(&self, topic: Topic) -> bool {
        self.topics.get(topic.as_str()).copied().unwrap_or(true)
    }
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            retention_days: default_retention_days(),
            min_severity: default_min_severity(),
            quiet_hours: None,
            topics: HashMap::new(),
            delivery_attempts: default_delivery_attempts(),
            delivery_delay_secs: default_delivery_delay_secs(),
        }
    }
}

/// Local-time window during which only Critical messages get through.
/// Wraps midnight when `start_hour > end_hour` (e.g. 22 → 6).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietHours {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelsConfig {
    pub webhook: Option<WebhookConfig>,
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub syslog: SyslogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyslogConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_syslog_socket")]
    pub socket: PathBuf,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            socket: default_syslog_socket(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecksConfig {
    #[serde(default)]
    pub services: ServicesCheckConfig,
    #[serde(default)]
    pub disk: DiskCheckConfig,
    #[serde(default)]
    pub zfs: ZfsCheckConfig,
    #[serde(default)]
    pub memory: MemoryCheckConfig,
    #[serde(default)]
    pub load: LoadCheckConfig,
    #[serde(default)]
    pub iowait: IowaitCheckConfig,
    #[serde(default)]
    pub network: NetworkCheckConfig,
    #[serde(default)]
    pub ssh: SshCheckConfig,
    #[serde(default)]
    pub events: EventsCheckConfig,
    #[serde(default)]
    pub temps: TempsCheckConfig,
    #[serde(default)]
    pub backups: BackupsCheckConfig,
    #[serde(default)]
    pub updates: UpdatesCheckConfig,
    #[serde(default)]
    pub vms: VmsCheckConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// systemd units to watch
    #[serde(default = "default_services")]
    pub units: Vec<String>,
    /// attempt one restart when a unit is inactive
    #[serde(default = "enabled")]
    pub restart: bool,
}

impl Default for ServicesCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            units: default_services(),
            restart: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// mount points to watch, usage percent per mount
    #[serde(default = "default_mounts")]
    pub mounts: Vec<PathBuf>,
    #[serde(default = "default_disk_thresholds")]
    pub usage: ThresholdPair,
}

impl Default for DiskCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mounts: default_mounts(),
            usage: default_disk_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZfsCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_zfs_thresholds")]
    pub capacity: ThresholdPair,
}

impl Default for ZfsCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_zfs_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_memory_thresholds")]
    pub usage: ThresholdPair,
    #[serde(default = "default_swap_thresholds")]
    pub swap: ThresholdPair,
    /// journal window for oom-kill events
    #[serde(default = "default_event_window_minutes")]
    pub oom_window_minutes: u64,
    /// oom-kill events within the window that trip the alert
    #[serde(default = "default_oom_max_events")]
    pub oom_max_events: u64,
}

impl Default for MemoryCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            usage: default_memory_thresholds(),
            swap: default_swap_thresholds(),
            oom_window_minutes: default_event_window_minutes(),
            oom_max_events: default_oom_max_events(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// 5-minute load average divided by core count, as a percent
    #[serde(default = "default_load_thresholds")]
    pub per_core: ThresholdPair,
}

impl Default for LoadCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_core: default_load_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IowaitCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_iowait_thresholds")]
    pub percent: ThresholdPair,
    /// gap between the two /proc/stat samples
    #[serde(default = "default_iowait_sample_gap_secs")]
    pub sample_gap_secs: u64,
}

impl Default for IowaitCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            percent: default_iowait_thresholds(),
            sample_gap_secs: default_iowait_sample_gap_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// connectivity probe target
    #[serde(default = "default_ping_target")]
    pub ping_target: String,
    /// new interface errors between runs that trip the alert
    #[serde(default = "default_iface_errors")]
    pub iface_errors: ThresholdPair,
    /// interfaces to ignore (loopback is always ignored)
    #[serde(default)]
    pub ignore_interfaces: Vec<String>,
}

impl Default for NetworkCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_target: default_ping_target(),
            iface_errors: default_iface_errors(),
            ignore_interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_event_window_minutes")]
    pub window_minutes: u64,
    /// failed-auth count within the window
    #[serde(default = "default_ssh_thresholds")]
    pub failures: ThresholdPair,
}

impl Default for SshCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: default_event_window_minutes(),
            failures: default_ssh_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_event_window_minutes")]
    pub window_minutes: u64,
    /// journal entries at priority crit or above within the window
    #[serde(default = "default_events_thresholds")]
    pub entries: ThresholdPair,
}

impl Default for EventsCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: default_event_window_minutes(),
            entries: default_events_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TempsCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_temp_thresholds")]
    pub celsius: ThresholdPair,
}

impl Default for TempsCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            celsius: default_temp_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupsCheckConfig {
    #[serde(default)]
    pub enabled: bool,
    /// directory holding backup artifacts
    #[serde(default = "default_backup_dir")]
    pub directory: PathBuf,
    /// age of the newest artifact, in hours
    #[serde(default = "default_backup_age_thresholds")]
    pub max_age_hours: ThresholdPair,
}

impl Default for BackupsCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_backup_dir(),
            max_age_hours: default_backup_age_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatesCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// pending package count
    #[serde(default = "default_updates_thresholds")]
    pub pending: ThresholdPair,
}

impl Default for UpdatesCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pending: default_updates_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmsCheckConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// also track LXC containers alongside VMs
    #[serde(default = "enabled")]
    pub containers: bool,
}

impl Default for VmsCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            containers: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutomationConfig {
    #[serde(default)]
    pub disk_cleanup: DiskCleanupConfig,
    #[serde(default)]
    pub memory_relief: MemoryReliefConfig,
    #[serde(default)]
    pub snapshot_prune: SnapshotPruneConfig,
    #[serde(default)]
    pub system_refresh: SystemRefreshConfig,
    #[serde(default)]
    pub auto_update: AutoUpdateConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskCleanupConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// only act when root usage is at or above this percent
    #[serde(default = "default_cleanup_trigger_percent")]
    pub trigger_percent: f64,
    #[serde(default = "default_cleanup_directories")]
    pub directories: Vec<CleanupDirectory>,
}

impl Default for DiskCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_percent: default_cleanup_trigger_percent(),
            directories: default_cleanup_directories(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupDirectory {
    pub path: PathBuf,
    /// files older than this many days are removed
    pub retention_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryReliefConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// only drop caches when memory usage is at or above this percent
    #[serde(default = "default_memory_trigger_percent")]
    pub trigger_percent: f64,
}

impl Default for MemoryReliefConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_percent: default_memory_trigger_percent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotPruneConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// snapshot-name pattern eligible for pruning
    #[serde(default = "default_snapshot_pattern")]
    pub pattern: String,
    /// snapshots older than this many days are destroyed
    #[serde(default = "default_snapshot_retention_days")]
    pub retention_days: u32,
}

impl Default for SnapshotPruneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: default_snapshot_pattern(),
            retention_days: default_snapshot_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemRefreshConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// services restarted as part of a refresh
    #[serde(default = "default_refresh_services")]
    pub services: Vec<String>,
    /// retention passed to journal vacuum, e.g. "7d"
    #[serde(default = "default_journal_vacuum")]
    pub journal_vacuum: String,
}

impl Default for SystemRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            services: default_refresh_services(),
            journal_vacuum: default_journal_vacuum(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoUpdateConfig {
    #[serde(default)]
    pub enabled: bool,
    /// restrict applied updates to security origin
    #[serde(default)]
    pub security_only: bool,
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            security_only: false,
        }
    }
}

impl Config {
    /// Assemble the configuration from defaults plus optional file layers.
    ///
    /// Layer order (later wins): compiled-in defaults, `path`,
    /// `<path stem>.local.json` next to it.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let mut merged = serde_json::Value::Object(Default::default());

        if let Some(path) = path {
            merge_layer(&mut merged, read_layer(path)?);

            let local = local_override_path(path);
            if local.exists() {
                debug!("applying local override layer {}", local.display());
                merge_layer(&mut merged, read_layer(&local)?);
            }
        }

        let config: Config = serde_json::from_value(merged)
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        config.validate()?;
        trace!("loaded config: {config:?}");
        Ok(config)
    }

    /// Every threshold pair must satisfy `critical > warning`; violations
    /// fail startup instead of silently misbehaving.
    pub fn validate(&self) -> anyhow::Result<()> {
        let checks = &self.checks;
        checks.disk.usage.validate("disk usage")?;
        checks.zfs.capacity.validate("zfs capacity")?;
        checks.memory.usage.validate("memory usage")?;
        checks.memory.swap.validate("swap usage")?;
        checks.load.per_core.validate("load per core")?;
        checks.iowait.percent.validate("iowait")?;
        checks.network.iface_errors.validate("interface errors")?;
        checks.ssh.failures.validate("ssh failures")?;
        checks.events.entries.validate("journal events")?;
        checks.temps.celsius.validate("temperature")?;
        checks.backups.max_age_hours.validate("backup age")?;
        checks.updates.pending.validate("pending updates")?;

        if let Some(quiet) = &self.alerting.quiet_hours {
            if quiet.start_hour > 23 || quiet.end_hour > 23 {
                anyhow::bail!(
                    "invalid quiet hours: {}..{} (hours must be 0-23)",
                    quiet.start_hour,
                    quiet.end_hour
                );
            }
        }

        if self.alerting.delivery_attempts == 0 {
            anyhow::bail!("delivery_attempts must be at least 1");
        }

        for dir in &self.automation.disk_cleanup.directories {
            if dir.retention_days == 0 {
                anyhow::bail!(
                    "cleanup retention for {} must be at least 1 day",
                    dir.path.display()
                );
            }
        }

        regex::Regex::new(&self.automation.snapshot_prune.pattern)
            .with_context(|| {
                format!(
                    "invalid snapshot prune pattern: {}",
                    self.automation.snapshot_prune.pattern
                )
            })
            .map(|_| ())
    }
}

fn read_layer(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("config file {} is not valid JSON", path.display()))
}

/// `config.json` → `config.local.json`
fn local_override_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.local.json"))
}

/// Recursive object merge; non-object values in `overlay` replace `base`.
fn merge_layer(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                merge_layer(base_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn enabled() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/node-warden")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/node-warden")
}

fn default_cooldown_minutes() -> u64 {
    30
}

fn default_retention_days() -> u32 {
    14
}

fn default_min_severity() -> Severity {
    Severity::Info
}

fn default_delivery_attempts() -> u32 {
    3
}

fn default_delivery_delay_secs() -> u64 {
    2
}

fn default_smtp_port() -> u16 {
    587
}

fn default_syslog_socket() -> PathBuf {
    PathBuf::from("/dev/log")
}

fn default_services() -> Vec<String> {
    ["pveproxy", "pvedaemon", "pvestatd", "pve-cluster", "sshd"]
        .map(String::from)
        .to_vec()
}

fn default_mounts() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

fn default_disk_thresholds() -> ThresholdPair {
    ThresholdPair::new(80.0, 95.0)
}

fn default_zfs_thresholds() -> ThresholdPair {
    ThresholdPair::new(75.0, 90.0)
}

fn default_memory_thresholds() -> ThresholdPair {
    ThresholdPair::new(85.0, 95.0)
}

fn default_swap_thresholds() -> ThresholdPair {
    ThresholdPair::new(60.0, 90.0)
}

fn default_load_thresholds() -> ThresholdPair {
    ThresholdPair::new(150.0, 300.0)
}

fn default_iowait_thresholds() -> ThresholdPair {
    ThresholdPair::new(20.0, 40.0)
}

fn default_iowait_sample_gap_secs() -> u64 {
    2
}

fn default_ping_target() -> String {
    "1.1.1.1".to_string()
}

fn default_iface_errors() -> ThresholdPair {
    ThresholdPair::new(10.0, 100.0)
}

fn default_event_window_minutes() -> u64 {
    10
}

fn default_oom_max_events() -> u64 {
    0
}

fn default_ssh_thresholds() -> ThresholdPair {
    ThresholdPair::new(10.0, 50.0)
}

fn default_events_thresholds() -> ThresholdPair {
    ThresholdPair::new(5.0, 20.0)
}

fn default_temp_thresholds() -> ThresholdPair {
    ThresholdPair::new(75.0, 90.0)
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/var/lib/vz/dump")
}

fn default_backup_age_thresholds() -> ThresholdPair {
    ThresholdPair::new(30.0, 54.0)
}

fn default_updates_thresholds() -> ThresholdPair {
    ThresholdPair::new(20.0, 50.0)
}

fn default_cleanup_trigger_percent() -> f64 {
    85.0
}

fn default_cleanup_directories() -> Vec<CleanupDirectory> {
    vec![
        CleanupDirectory {
            path: PathBuf::from("/var/tmp"),
            retention_days: 7,
        },
        CleanupDirectory {
            path: PathBuf::from("/var/cache/apt/archives"),
            retention_days: 14,
        },
    ]
}

fn default_memory_trigger_percent() -> f64 {
    90.0
}

fn default_snapshot_pattern() -> String {
    "^auto".to_string()
}

fn default_snapshot_retention_days() -> u32 {
    7
}

fn default_refresh_services() -> Vec<String> {
    vec!["pvestatd".to_string(), "pveproxy".to_string()]
}

fn default_journal_vacuum() -> String {
    "7d".to_string()
}

fn default_command_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_json(value: serde_json::Value) -> anyhow::Result<Config> {
        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn empty_object_yields_full_defaults() {
        let config = from_json(serde_json::json!({})).unwrap();
        assert_eq!(config.alerting.cooldown_minutes, 30);
        assert_eq!(config.checks.disk.usage.warning, 80.0);
        assert!(config.checks.services.enabled);
        assert!(config.alerting.topic_enabled(Topic::Disk));
    }

    #[test]
    fn inverted_thresholds_fail_validation() {
        let result = from_json(serde_json::json!({
            "checks": { "disk": { "usage": { "warning": 95.0, "critical": 80.0 } } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn topic_toggle_disables_only_named_topic() {
        let config = from_json(serde_json::json!({
            "alerting": { "topics": { "updates": false } }
        }))
        .unwrap();
        assert!(!config.alerting.topic_enabled(Topic::Updates));
        assert!(config.alerting.topic_enabled(Topic::Disk));
    }

    #[test]
    fn merge_layer_overrides_nested_values() {
        let mut base = serde_json::json!({
            "alerting": { "cooldown_minutes": 30, "retention_days": 14 }
        });
        merge_layer(
            &mut base,
            serde_json::json!({ "alerting": { "cooldown_minutes": 5 } }),
        );
        assert_eq!(base["alerting"]["cooldown_minutes"], 5);
        assert_eq!(base["alerting"]["retention_days"], 14);
    }

    #[test]
    fn quiet_hours_wrap_midnight() {
        let quiet = QuietHours {
            start_hour: 22,
            end_hour: 6,
        };
        assert!(quiet.contains(23));
        assert!(quiet.contains(3));
        assert!(!quiet.contains(12));

        let day = QuietHours {
            start_hour: 9,
            end_hour: 17,
        };
        assert!(day.contains(9));
        assert!(!day.contains(17));
    }

    #[test]
    fn invalid_quiet_hours_fail_validation() {
        let result = from_json(serde_json::json!({
            "alerting": { "quiet_hours": { "start_hour": 25, "end_hour": 6 } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn local_override_path_swaps_extension() {
        assert_eq!(
            local_override_path(Path::new("/etc/node-warden/config.json")),
            PathBuf::from("/etc/node-warden/config.local.json")
        );
    }
}
