//! Readiness checks run after a service's process has been spawned.
//!
//! Every policy races the service's own exit: a process that dies while it is
//! being probed fails the check immediately.

use crate::config::ReadinessPolicy;
use crate::process::{ChildEnv, ProcessHandle, ProcessState};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{Instant, sleep, timeout};

const TCP_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);
const TCP_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Wait until `handle` satisfies `policy`. The error is a human-readable reason.
pub async fn wait_ready(
    policy: &ReadinessPolicy,
    handle: &ProcessHandle,
    working_dir: &Path,
    env: &ChildEnv,
) -> Result<(), String> {
    tokio::select! {
        state = handle.wait() => Err(describe_exit(state)),
        result = probe(policy, working_dir, env) => {
            // The probe may succeed in the same instant the process dies.
            match handle.state() {
                ProcessState::Running => result,
                state => Err(describe_exit(state)),
            }
        }
    }
}

async fn probe(policy: &ReadinessPolicy, working_dir: &Path, env: &ChildEnv) -> Result<(), String> {
    match policy {
        ReadinessPolicy::Grace(window) => {
            sleep(*window).await;
            Ok(())
        }
        ReadinessPolicy::Command {
            command,
            timeout: limit,
            interval,
        } => poll_until(*limit, *interval, || run_probe(command, working_dir, env))
            .await
            .map_err(|_| format!("probe '{}' did not succeed within {:?}", command, limit)),
        ReadinessPolicy::Tcp {
            host,
            port,
            timeout: limit,
        } => poll_until(*limit, TCP_RETRY_INTERVAL, || connect(host, *port))
            .await
            .map_err(|_| format!("{}:{} not accepting connections after {:?}", host, port, limit)),
    }
}

/// Retry `attempt` every `interval` until it returns true or `limit` elapses.
async fn poll_until<F, Fut>(limit: Duration, interval: Duration, mut attempt: F) -> Result<(), ()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(());
        }
        if let Ok(true) = timeout(remaining, attempt()).await {
            return Ok(());
        }
        if Instant::now() + interval >= deadline {
            return Err(());
        }
        sleep(interval).await;
    }
}

async fn run_probe(command: &str, working_dir: &Path, env: &ChildEnv) -> bool {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    env.apply(&mut cmd);
    match cmd.status().await {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::debug!(command, error = %e, "readiness probe failed to spawn");
            false
        }
    }
}

async fn connect(host: &str, port: u16) -> bool {
    matches!(
        timeout(TCP_ATTEMPT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Human-readable description of a finished process.
pub fn describe_exit(state: ProcessState) -> String {
    match state {
        ProcessState::Exited(Some(code)) => format!("process exited with code {}", code),
        ProcessState::Exited(None) => "process was killed by a signal".to_string(),
        ProcessState::Killed => "process was stopped".to_string(),
        ProcessState::Running => "process is still running".to_string(),
    }
}
