use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use node_warden::alerts::AlertDispatcher;
use node_warden::automation::{self, TaskCtx, TaskName};
use node_warden::checks::{self, CheckCtx};
use node_warden::config::Config;
use node_warden::exec::SystemExecutor;
use node_warden::lock::{LockAttempt, RunLock};
use node_warden::maintenance::{self, FileMaintenanceStore, MaintenanceStore};
use node_warden::notify::build_channels;
use node_warden::runlog::RunLog;
use node_warden::state::{FileAlertStateStore, FileBaselineStore};
use node_warden::{Severity, Topic};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(name = "warden", about = "Host health monitoring and self-healing agent")]
struct Args {
    /// Config file (defaults apply if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run all enabled health checks; exit status is the number of
    /// checks with issues (0 = clean)
    Check,

    /// Run one automation task
    Task {
        /// disk-cleanup, memory-relief, snapshot-prune, system-refresh,
        /// auto-update
        name: String,

        /// Report intended effects without mutating anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage the maintenance window
    Maintenance {
        #[command(subcommand)]
        action: MaintenanceAction,
    },

    /// Send an ad-hoc notification through the configured channels
    Notify {
        #[arg(short, long)]
        message: String,

        /// ok, info, warning, critical
        #[arg(short, long, default_value = "info")]
        severity: String,

        /// services, disk, zfs, memory, cpu, network, ssh, events,
        /// temps, backups, updates, vms, automation, general
        #[arg(short, long, default_value = "general")]
        topic: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum MaintenanceAction {
    /// Enable the window (indefinite unless --duration is given)
    On {
        /// e.g. 30m, 2h, 1d
        #[arg(short, long)]
        duration: Option<String>,

        #[arg(short, long, default_value = "unspecified")]
        reason: String,
    },

    /// Disable the window
    Off,

    /// Report whether a window is active
    Status,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("node_warden", LevelFilter::DEBUG),
        ("warden", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            // configuration and startup failures are the only loud exits;
            // leave a critical line in the default run log so the failure
            // is visible even when stderr goes nowhere
            error!("{e:#}");
            if let Ok(runlog) = RunLog::new(std::path::Path::new("/var/log/node-warden")) {
                runlog.record(Severity::Critical, "startup", &format!("{e:#}"));
            }
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let config_path = args
        .config
        .or_else(|| std::env::var("WARDEN_CONFIG").ok().map(PathBuf::from));
    let config = Config::load(config_path.as_deref())?;

    match args.command {
        Command::Check => run_checks(config).await,

        Command::Task { name, dry_run } => {
            let task: TaskName = name.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let ctx = build_task_ctx(config)?;
            let result = automation::run_automation_task(&ctx, task, dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(if result.succeeded { 0 } else { 1 })
        }

        Command::Maintenance { action } => {
            let store = FileMaintenanceStore::new(&config.paths.state_dir)?;
            match action {
                MaintenanceAction::On { duration, reason } => {
                    let duration = duration.map(|d| parse_duration(&d)).transpose()?;
                    let window = maintenance::enable(&store, duration, &reason).await?;
                    println!(
                        "maintenance enabled until {}",
                        window
                            .expires_at
                            .map(|at| at.to_rfc3339())
                            .unwrap_or_else(|| "never (disable explicitly)".to_string())
                    );
                }
                MaintenanceAction::Off => {
                    maintenance::disable(&store).await?;
                    println!("maintenance disabled");
                }
                MaintenanceAction::Status => match store.get().await? {
                    Some(window) if !window.expired(chrono::Utc::now()) => {
                        println!(
                            "active ({}), expires: {}",
                            window.reason,
                            window
                                .expires_at
                                .map(|at| at.to_rfc3339())
                                .unwrap_or_else(|| "never".to_string())
                        );
                    }
                    _ => println!("inactive"),
                },
            }
            Ok(0)
        }

        Command::Notify {
            message,
            severity,
            topic,
        } => {
            let severity: Severity = severity.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let topic: Topic = topic.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let ctx = build_task_ctx(config)?;
            let outcome = ctx.dispatcher.send_manual(&message, severity, topic).await?;
            println!("{outcome:?}");
            Ok(0)
        }
    }
}

async fn run_checks(config: Config) -> anyhow::Result<i32> {
    // overlapping runs are a benign skip, not an error
    let _lock = match RunLock::acquire(&config.paths.state_dir)? {
        LockAttempt::Acquired(lock) => lock,
        LockAttempt::Held { pid } => {
            info!("another run holds the lock (pid {pid}), skipping");
            return Ok(0);
        }
    };

    let ctx = build_check_ctx(config)?;
    let failing = checks::run_all_health_checks(&ctx).await?;
    info!("{failing} check(s) with issues");
    Ok(failing.min(100) as i32)
}

fn build_check_ctx(config: Config) -> anyhow::Result<CheckCtx> {
    let state = Arc::new(FileAlertStateStore::new(&config.paths.state_dir)?);
    let baselines = Arc::new(FileBaselineStore::new(&config.paths.state_dir)?);
    let maintenance = Arc::new(FileMaintenanceStore::new(&config.paths.state_dir)?);
    let runlog = Arc::new(RunLog::new(&config.paths.log_dir)?);
    let executor = Arc::new(SystemExecutor::new(std::time::Duration::from_secs(
        config.command_timeout_secs,
    )));

    let dispatcher = AlertDispatcher::new(
        state.clone(),
        maintenance.clone(),
        build_channels(&config.channels),
        runlog.clone(),
        config.alerting.clone(),
    );

    Ok(CheckCtx {
        config,
        dispatcher,
        state,
        baselines,
        maintenance,
        executor,
        runlog,
    })
}

fn build_task_ctx(config: Config) -> anyhow::Result<TaskCtx> {
    let state = Arc::new(FileAlertStateStore::new(&config.paths.state_dir)?);
    let maintenance = Arc::new(FileMaintenanceStore::new(&config.paths.state_dir)?);
    let runlog = Arc::new(RunLog::new(&config.paths.log_dir)?);
    let executor = Arc::new(SystemExecutor::new(std::time::Duration::from_secs(
        config.command_timeout_secs,
    )));

    let dispatcher = AlertDispatcher::new(
        state,
        maintenance,
        build_channels(&config.channels),
        runlog.clone(),
        config.alerting.clone(),
    );

    Ok(TaskCtx {
        config,
        dispatcher,
        executor,
        runlog,
    })
}

/// `30m`, `2h`, `1d` (bare numbers are minutes)
fn parse_duration(input: &str) -> anyhow::Result<chrono::Duration> {
    let input = input.trim();
    let (number, unit) = match input.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => input.split_at(split),
        None => (input, "m"),
    };
    let number: i64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration: {input}"))?;

    match unit {
        "m" | "min" => Ok(chrono::Duration::minutes(number)),
        "h" => Ok(chrono::Duration::hours(number)),
        "d" => Ok(chrono::Duration::days(number)),
        other => anyhow::bail!("invalid duration unit: {other} (expected m, h, or d)"),
    }
}
