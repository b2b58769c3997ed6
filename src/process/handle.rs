//! A running service command.

use super::env::ChildEnv;
use super::signal;
use crate::errors::LaunchError;
use crate::router::{LogLine, StreamKind};
use chrono::{DateTime, Local};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How long the waiter lets readers drain after the child exits.
const READER_DRAIN: Duration = Duration::from_millis(250);

/// How long to wait for the group to die after SIGKILL.
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Lifecycle of one child as seen by its waiter task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited on its own. `None` when terminated by a signal nobody here sent.
    Exited(Option<i32>),
    /// Exited after a stop was requested.
    Killed,
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    AlreadyExited,
    /// Exited within the grace period after SIGTERM.
    Terminated,
    /// Needed SIGKILL.
    Forced,
}

/// Handle to a spawned `sh -c` child and its process group.
///
/// The `Child` itself is owned by a waiter task which publishes the exit on a
/// watch channel, so liveness checks never block and never race a reap.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    started_at: DateTime<Local>,
    state: watch::Receiver<ProcessState>,
    stop_requested: Arc<AtomicBool>,
    waiter: JoinHandle<()>,
}

impl ProcessHandle {
    /// Spawn `command` for `service` and start forwarding its output to `log_tx`.
    pub fn spawn(
        service: &str,
        command: &str,
        working_dir: &Path,
        env: &ChildEnv,
        log_tx: mpsc::Sender<LogLine>,
    ) -> Result<Self, LaunchError> {
        if !working_dir.is_dir() {
            return Err(LaunchError::MissingWorkingDir {
                service: service.to_string(),
                path: working_dir.to_path_buf(),
            });
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        env.apply(&mut cmd);

        let spawn_err = |source: std::io::Error| LaunchError::Spawn {
            service: service.to_string(),
            command: command.to_string(),
            source,
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_err(std::io::Error::other("child exited before its pid was read")))?;

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(service, StreamKind::Stdout, stdout, log_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(service, StreamKind::Stderr, stderr, log_tx));
        }

        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let stop_requested = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop_requested);
        let name = service.to_string();

        let waiter = tokio::spawn(async move {
            let status = child.wait().await;
            // Let the readers flush what the child wrote before the exit is published.
            let _ = tokio::time::timeout(READER_DRAIN, futures::future::join_all(readers)).await;

            let state = if stop_flag.load(Ordering::SeqCst) {
                ProcessState::Killed
            } else {
                match status {
                    Ok(status) => ProcessState::Exited(status.code()),
                    Err(e) => {
                        tracing::warn!(service = %name, error = %e, "wait on child failed");
                        ProcessState::Exited(None)
                    }
                }
            };
            tracing::debug!(service = %name, pid, ?state, "child exited");
            state_tx.send_replace(state);
        });

        tracing::debug!(service, pid, command, "spawned child");

        Ok(Self {
            pid,
            started_at: Local::now(),
            state: state_rx,
            stop_requested,
            waiter,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Current state without waiting.
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Wait until the child has exited.
    pub async fn wait(&self) -> ProcessState {
        let mut rx = self.state.clone();
        match rx.wait_for(|s| !s.is_running()).await {
            Ok(state) => *state,
            // Waiter is gone without publishing; the child went with it.
            Err(_) => ProcessState::Killed,
        }
    }

    /// Stop the whole process group: SIGTERM, then SIGKILL after `grace`.
    pub async fn stop(&self, grace: Duration) -> StopOutcome {
        if !self.is_running() {
            // The leader is gone but forked children may linger in the group.
            signal::signal_group(self.pid, libc::SIGKILL);
            return StopOutcome::AlreadyExited;
        }

        self.stop_requested.store(true, Ordering::SeqCst);
        signal::signal_group(self.pid, libc::SIGTERM);

        if tokio::time::timeout(grace, self.wait()).await.is_ok() {
            if signal::is_group_alive(self.pid) {
                signal::signal_group(self.pid, libc::SIGKILL);
            }
            return StopOutcome::Terminated;
        }

        tracing::debug!(pid = self.pid, "grace period expired, sending SIGKILL");
        signal::signal_group(self.pid, libc::SIGKILL);
        if tokio::time::timeout(KILL_WAIT, self.wait()).await.is_err() {
            tracing::warn!(pid = self.pid, "process group survived SIGKILL wait");
        }
        StopOutcome::Forced
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.is_running() {
            signal::signal_group(self.pid, libc::SIGKILL);
        }
        self.waiter.abort();
    }
}

/// Spawn a reader task that turns a pipe into `LogLine`s.
fn forward_lines<R>(
    service: &str,
    stream: StreamKind,
    pipe: R,
    tx: mpsc::Sender<LogLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let service = service.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let text = text.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(LogLine::new(&service, stream, text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(service = %service, error = %e, "pipe read failed");
                    break;
                }
            }
        }
    })
}

/// Run a one-shot command with its output streamed to the log, returning its exit code.
pub async fn run_to_completion(
    service: &str,
    command: &str,
    working_dir: &Path,
    env: &ChildEnv,
    log_tx: mpsc::Sender<LogLine>,
) -> Result<Option<i32>, LaunchError> {
    let handle = ProcessHandle::spawn(service, command, working_dir, env, log_tx)?;
    Ok(match handle.wait().await {
        ProcessState::Exited(code) => code,
        ProcessState::Running | ProcessState::Killed => None,
    })
}
