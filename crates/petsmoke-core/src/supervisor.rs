//! Lifecycle management for the single supervised server process.
//!
//! The supervisor owns at most one child at a time:
//! - `start` spawns it and returns without waiting for readiness
//! - `is_running` is a non-blocking liveness check
//! - `stop` asks politely (SIGTERM), waits a grace period, then kills
//!
//! `stop` never fails; OS errors are logged and swallowed so it is safe to
//! call from cleanup paths. Children are spawned with `kill_on_drop`, so
//! dropping the supervisor still takes the process down.
//!
//! On unix the child leads its own process group and signals go to the whole
//! group: `npm run start` forks the node process that actually holds the
//! port, and it has to die with npm.

use crate::command::CommandSpec;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tracing::{debug, info, warn};

/// Default time a process gets to exit after SIGTERM before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// What to do with the child's stdout/stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the parent's terminal
    Inherit,
    /// Pipe both streams and re-emit each line through tracing (target `server`)
    #[default]
    Log,
    /// Discard everything
    Null,
}

/// A running (or exited) child owned by a [`ProcessSupervisor`].
#[derive(Debug)]
pub struct SupervisedProcess {
    /// Command line, for diagnostics
    pub command: String,
    pub working_directory: Option<PathBuf>,
    pub pid: Option<u32>,
    child: Child,
    exit_status: Option<ExitStatus>,
}

impl SupervisedProcess {
    fn poll_exit(&mut self) -> bool {
        if self.exit_status.is_some() {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to query process {:?}: {}", self.pid, e);
                false
            }
        }
    }
}

/// Owns the lifecycle of one external process.
#[derive(Debug)]
pub struct ProcessSupervisor {
    grace_period: Duration,
    output: OutputMode,
    process: Option<SupervisedProcess>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD, OutputMode::default())
    }
}

impl ProcessSupervisor {
    pub fn new(grace_period: Duration, output: OutputMode) -> Self {
        Self {
            grace_period,
            output,
            process: None,
        }
    }

    /// Launch the process and return immediately.
    pub fn start(&mut self, spec: &CommandSpec) -> Result<&SupervisedProcess> {
        if let Some(pid) = self.running_pid() {
            return Err(Error::AlreadyRunning(pid));
        }

        info!("Starting: {} (cwd={:?})", spec.display(), spec.cwd);
        let mut cmd = spec.to_command();
        #[cfg(unix)]
        cmd.process_group(0);
        match self.output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Log => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Null => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut child = cmd.spawn()?;
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, "stderr");
        }

        let pid = child.id();
        debug!("Spawned pid {:?}", pid);

        Ok(self.process.insert(SupervisedProcess {
            command: spec.display(),
            working_directory: spec.cwd.clone(),
            pid,
            child,
            exit_status: None,
        }))
    }

    /// Non-blocking liveness check.
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => !process.poll_exit(),
            None => false,
        }
    }

    fn running_pid(&mut self) -> Option<u32> {
        if self.is_running() {
            self.process.as_ref().and_then(|p| p.pid)
        } else {
            None
        }
    }

    /// Terminate the process: SIGTERM, wait out the grace period, then kill.
    ///
    /// Idempotent and infallible. Returns the exit status if one was observed.
    pub async fn stop(&mut self) -> Option<ExitStatus> {
        let grace_period = self.grace_period;
        let process = self.process.as_mut()?;

        if process.poll_exit() {
            debug!("Process {:?} already exited", process.pid);
            // The leader is gone but its descendants may not be
            kill_group(process);
            return process.exit_status;
        }

        info!("Stopping {} (pid {:?})", process.command, process.pid);
        request_termination(process);

        match tokio::time::timeout(grace_period, process.child.wait()).await {
            Ok(Ok(status)) => {
                process.exit_status = Some(status);
            }
            Ok(Err(e)) => {
                warn!("Failed waiting for pid {:?}: {}", process.pid, e);
            }
            Err(_) => {
                warn!(
                    "pid {:?} still running after {:?}, killing",
                    process.pid, grace_period
                );
                kill_group(process);
                if let Err(e) = process.child.kill().await {
                    warn!("Failed to kill pid {:?}: {}", process.pid, e);
                }
                process.poll_exit();
            }
        }

        // Stragglers that ignored SIGTERM after the leader exited
        kill_group(process);

        debug!("Process {:?} stopped: {:?}", process.pid, process.exit_status);
        process.exit_status
    }
}

/// Send `signal` to the process group led by `pid`. Returns `false` when the
/// group no longer exists.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    // SAFETY: plain signal delivery to a process group created at spawn time.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if rc == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::ESRCH) {
        warn!("Signal {} to process group {} failed: {}", signal, pid, err);
    }
    false
}

#[cfg(unix)]
fn request_termination(process: &mut SupervisedProcess) {
    if let Some(pid) = process.pid {
        signal_group(pid, libc::SIGTERM);
    }
}

#[cfg(unix)]
fn kill_group(process: &SupervisedProcess) {
    let Some(pid) = process.pid else {
        return;
    };
    if signal_group(pid, libc::SIGKILL) {
        debug!("Killed remaining members of process group {}", pid);
    }
}

#[cfg(not(unix))]
fn request_termination(process: &mut SupervisedProcess) {
    // No graceful signal available; the kill is the termination request.
    if let Err(e) = process.child.start_kill() {
        warn!("Failed to terminate pid {:?}: {}", process.pid, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_process: &SupervisedProcess) {}

fn forward_lines<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "server", stream, "{}", line);
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{pid_alive, wait_for_exit};
    use std::path::Path;
    use std::time::Instant;
    use tempfile::tempdir;

    fn sleeper(secs: u32) -> CommandSpec {
        CommandSpec::new("sleep").arg(secs.to_string())
    }

    /// `sh` that forks a `sleep` and writes its pid to `pid_file`.
    fn forking_shell(pid_file: &Path, then: &str) -> CommandSpec {
        let script = format!("sleep 37 & echo $! > '{}'; {}", pid_file.display(), then);
        CommandSpec::new("sh").args(["-c", script.as_str()])
    }

    async fn read_pid(pid_file: &Path) -> u32 {
        for _ in 0..50 {
            if let Ok(text) = std::fs::read_to_string(pid_file) {
                if let Ok(pid) = text.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no pid written to {}", pid_file.display());
    }

    #[tokio::test]
    async fn test_start_returns_immediately_and_stop_terminates() {
        let mut supervisor = ProcessSupervisor::new(DEFAULT_GRACE_PERIOD, OutputMode::Null);

        let started = Instant::now();
        let pid = supervisor
            .start(&sleeper(30))
            .expect("sleep should spawn")
            .pid
            .expect("running child has a pid");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(supervisor.is_running());

        let status = supervisor.stop().await;
        assert!(status.is_some());
        assert!(!supervisor.is_running());
        assert!(!pid_alive(pid));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut supervisor = ProcessSupervisor::new(DEFAULT_GRACE_PERIOD, OutputMode::Null);

        // Nothing started yet
        assert!(supervisor.stop().await.is_none());

        supervisor.start(&sleeper(30)).expect("sleep should spawn");
        let first = supervisor.stop().await;
        let second = supervisor.stop().await;
        assert_eq!(first, second);
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_stop_after_natural_exit() {
        let mut supervisor = ProcessSupervisor::new(DEFAULT_GRACE_PERIOD, OutputMode::Null);
        supervisor
            .start(&CommandSpec::new("sh").args(["-c", "exit 7"]))
            .expect("sh should spawn");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!supervisor.is_running());

        let status = supervisor.stop().await.expect("exit status recorded");
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn test_escalates_to_kill_when_sigterm_ignored() {
        let mut supervisor =
            ProcessSupervisor::new(Duration::from_millis(300), OutputMode::Null);
        let pid = supervisor
            .start(&CommandSpec::new("sh").args(["-c", "trap '' TERM; exec sleep 30"]))
            .expect("sh should spawn")
            .pid
            .expect("running child has a pid");

        // Give the shell time to install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        supervisor.stop().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!supervisor.is_running());
        assert!(!pid_alive(pid));
    }

    #[tokio::test]
    async fn test_stop_takes_down_grandchildren() {
        let temp = tempdir().expect("Failed to create temp dir");
        let pid_file = temp.path().join("grandchild.pid");
        let mut supervisor = ProcessSupervisor::new(DEFAULT_GRACE_PERIOD, OutputMode::Null);
        let leader = supervisor
            .start(&forking_shell(&pid_file, "wait"))
            .expect("sh should spawn")
            .pid
            .expect("running child has a pid");
        let grandchild = read_pid(&pid_file).await;
        assert!(pid_alive(grandchild));

        supervisor.stop().await;

        assert!(!pid_alive(leader));
        assert!(
            wait_for_exit(grandchild, Duration::from_secs(2)).await,
            "grandchild {} survived stop()",
            grandchild
        );
    }

    #[tokio::test]
    async fn test_stop_reaps_orphans_of_exited_leader() {
        let temp = tempdir().expect("Failed to create temp dir");
        let pid_file = temp.path().join("orphan.pid");
        let mut supervisor = ProcessSupervisor::new(DEFAULT_GRACE_PERIOD, OutputMode::Null);
        supervisor
            .start(&forking_shell(&pid_file, "exit 0"))
            .expect("sh should spawn");
        let orphan = read_pid(&pid_file).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!supervisor.is_running());
        assert!(pid_alive(orphan));

        supervisor.stop().await;
        assert!(wait_for_exit(orphan, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_only_one_process_at_a_time() {
        let mut supervisor = ProcessSupervisor::new(DEFAULT_GRACE_PERIOD, OutputMode::Null);
        supervisor.start(&sleeper(30)).expect("sleep should spawn");

        match supervisor.start(&sleeper(30)) {
            Err(Error::AlreadyRunning(_)) => {}
            other => panic!("expected AlreadyRunning, got {:?}", other.map(|p| p.pid)),
        }

        supervisor.stop().await;
        // A stopped supervisor may start again
        supervisor.start(&sleeper(30)).expect("restart after stop");
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_log_mode_drains_output() {
        let mut supervisor = ProcessSupervisor::new(DEFAULT_GRACE_PERIOD, OutputMode::Log);
        supervisor
            .start(&CommandSpec::new("sh").args(["-c", "echo ready; echo oops >&2"]))
            .expect("sh should spawn");

        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = supervisor.stop().await.expect("exit status recorded");
        assert!(status.success());
    }
}
