//! External command execution
//!
//! Every shell-out in the agent (systemctl, zpool, journalctl, package
//! manager, VM tooling) goes through the [`CommandExecutor`] trait so the
//! check and automation engines can be tested without touching the host.
//!
//! The production implementation bounds every invocation with a timeout;
//! a hung dependency surfaces as that check's failure, never as a stalled
//! run.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{trace, warn};

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code; -1 when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Trimmed stdout lines, empty lines dropped.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args`, capturing output. A non-zero exit is an
    /// `Ok` with its status; `Err` means the command could not run at all
    /// (missing binary, timeout).
    async fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<CommandOutput>;
}

/// Production executor: spawns the real process under a hard timeout.
pub struct SystemExecutor {
    timeout: Duration,
}

impl SystemExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<CommandOutput> {
        trace!("running {program} {args:?}");

        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!("{program} {args:?} timed out after {:?}", self.timeout);
                anyhow::anyhow!("{program} timed out after {:?}", self.timeout)
            })?
            .with_context(|| format!("failed to collect output of {program}"))?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Scripted executor for tests: canned responses plus a record of every
/// invocation, so dry-run purity can be asserted as "no mutating command
/// ever ran".
pub struct MockExecutor {
    responses: std::sync::Mutex<Vec<(String, CommandOutput)>>,
    invocations: std::sync::Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(Vec::new()),
            invocations: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register a canned response for any invocation whose rendered
    /// command line starts with `prefix`. First match wins.
    pub fn respond(self, prefix: &str, status: i32, stdout: &str) -> Self {
        self.responses.lock().unwrap().push((
            prefix.to_string(),
            CommandOutput {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    /// Every command line this executor has seen, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    /// True if any recorded command line starts with `prefix`.
    pub fn saw(&self, prefix: &str) -> bool {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .any(|line| line.starts_with(prefix))
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<CommandOutput> {
        let line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{program} {}", args.join(" "))
        };
        self.invocations.lock().unwrap().push(line.clone());

        let responses = self.responses.lock().unwrap();
        for (prefix, output) in responses.iter() {
            if line.starts_with(prefix.as_str()) {
                return Ok(output.clone());
            }
        }

        // unscripted commands succeed with empty output
        Ok(CommandOutput {
            status: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_scripted_response_by_prefix() {
        let exec = MockExecutor::new().respond("systemctl is-active", 3, "inactive\n");

        let output = exec
            .run("systemctl", &["is-active", "pveproxy"])
            .await
            .unwrap();
        assert_eq!(output.status, 3);
        assert_eq!(output.stdout, "inactive\n");
        assert!(exec.saw("systemctl is-active pveproxy"));
    }

    #[tokio::test]
    async fn mock_records_invocation_order() {
        let exec = MockExecutor::new();
        exec.run("first", &[]).await.unwrap();
        exec.run("second", &["arg"]).await.unwrap();
        assert_eq!(exec.invocations(), vec!["first", "second arg"]);
    }

    #[tokio::test]
    async fn system_executor_reports_missing_binary_as_error() {
        let exec = SystemExecutor::new(Duration::from_secs(2));
        let result = exec.run("definitely-not-a-real-binary-xyz", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn command_output_lines_skips_blanks() {
        let output = CommandOutput {
            status: 0,
            stdout: "one\n\n  two  \n".to_string(),
            stderr: String::new(),
        };
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines, vec!["one", "two"]);
    }
}
