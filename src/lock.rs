//! Process run lock
//!
//! The check engine acquires a single non-blocking lock before running;
//! if another invocation holds it, the new one exits immediately as a
//! benign skip (exit 0) and the external scheduler retries on its next
//! tick. The lock is a pid file created with `O_EXCL`; a file left behind
//! by a dead process is taken over after a liveness probe.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

/// Outcome of a lock attempt.
#[derive(Debug)]
pub enum LockAttempt {
    Acquired(RunLock),
    /// Another live invocation holds the lock.
    Held { pid: u32 },
}

impl RunLock {
    pub fn acquire(state_dir: &Path) -> anyhow::Result<LockAttempt> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join("warden.lock");

        match try_create(&path)? {
            true => Ok(LockAttempt::Acquired(RunLock { path })),
            false => {
                let holder = read_holder(&path);
                match holder {
                    Some(pid) if process_alive(pid) => {
                        debug!("run lock held by live pid {pid}");
                        Ok(LockAttempt::Held { pid })
                    }
                    _ => {
                        // stale lock from a killed run
                        info!("taking over stale run lock at {}", path.display());
                        std::fs::remove_file(&path)?;
                        if try_create(&path)? {
                            Ok(LockAttempt::Acquired(RunLock { path }))
                        } else {
                            // lost the race to another invocation
                            Ok(LockAttempt::Held {
                                pid: read_holder(&path).unwrap_or(0),
                            })
                        }
                    }
                }
            }
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("failed to release run lock {}: {e}", self.path.display());
        }
    }
}

fn try_create(path: &Path) -> anyhow::Result<bool> {
    use std::io::Write;

    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => {
            write!(file, "{}", std::process::id())?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn read_holder(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_and_drop_releases() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("warden.lock");

        {
            let attempt = RunLock::acquire(dir.path()).unwrap();
            assert_matches!(attempt, LockAttempt::Acquired(_));
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn second_acquire_reports_held() {
        let dir = TempDir::new().unwrap();

        let _first = match RunLock::acquire(dir.path()).unwrap() {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Held { .. } => panic!("first acquire should succeed"),
        };

        // own pid is alive, so the second attempt must skip
        let second = RunLock::acquire(dir.path()).unwrap();
        assert_matches!(second, LockAttempt::Held { .. });
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        // pid 0 never appears under /proc
        std::fs::write(dir.path().join("warden.lock"), "0").unwrap();

        let attempt = RunLock::acquire(dir.path()).unwrap();
        assert_matches!(attempt, LockAttempt::Acquired(_));
    }
}
