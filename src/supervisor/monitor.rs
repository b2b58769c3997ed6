//! Background liveness polling.

use super::Supervisor;
use crate::process::ProcessState;
use crate::registry::{FailureReason, ServiceEntry, ServiceStatus};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

impl Supervisor {
    /// Poll every service on the configured interval until shutdown begins.
    pub fn spawn_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(supervisor.monitor_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if supervisor.is_shutting_down() {
                    break;
                }
                supervisor.poll_once().await;
            }
            tracing::debug!("monitor stopped");
        })
    }

    /// One pass over every service. Records exits that nobody asked for.
    pub(crate) async fn poll_once(&self) {
        for entry in self.registry.entries() {
            self.reap(entry).await;
        }
    }

    /// Record an unrequested exit of `entry`'s process, if there was one.
    ///
    /// A service that was STARTING or READY and whose process exited becomes
    /// FAILED (nonzero code or signal) or STOPPED (code 0), with exactly one
    /// status line. Exits caused by a stop request only clear the slot.
    pub(crate) async fn reap(&self, entry: &ServiceEntry) {
        let Some(handle) = entry.process() else {
            return;
        };
        match handle.state() {
            ProcessState::Running => {}
            ProcessState::Killed => {
                entry.detach_if(&handle);
            }
            ProcessState::Exited(code) => {
                if !entry.detach_if(&handle) {
                    return;
                }
                entry.record_exit(code);

                let expected = [ServiceStatus::Starting, ServiceStatus::Ready];
                if code == Some(0) {
                    if entry.transition_if(&expected, ServiceStatus::Stopped, None) {
                        self.emit(entry.name(), "exited with code 0").await;
                    }
                } else {
                    let failure = FailureReason::Crashed { code };
                    let line = format!("crashed: {}", failure);
                    if entry.transition_if(&expected, ServiceStatus::Failed, Some(failure)) {
                        tracing::warn!(service = %entry.name(), ?code, "service crashed");
                        self.emit(entry.name(), line).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigOverrides, RunnerConfig, RunnerToml};
    use crate::registry::{FailureReason, ServiceStatus};
    use crate::router::{Console, LineFormatter, LogRouter, StreamKind};
    use crate::supervisor::Supervisor;
    use std::sync::Arc;
    use std::time::Duration;

    fn supervisor(dir: &std::path::Path, start_command: &str) -> (Arc<Supervisor>, Arc<LogRouter>) {
        let text = format!(
            "[runner]\nmonitor_interval_ms = 50\ndefault_grace_ms = 100\n\n[[service]]\nname = \"api\"\nstart_command = \"{}\"\n",
            start_command
        );
        let config = RunnerConfig::from_toml(
            RunnerToml::parse(&text).unwrap(),
            dir,
            &ConfigOverrides::default(),
        )
        .unwrap();
        let router = Arc::new(LogRouter::from_config(
            &config,
            Arc::new(Console::capture()),
            LineFormatter::new(&config.service_names()),
        ));
        let (tx, rx) = LogRouter::channel();
        router.spawn(rx);
        (
            Arc::new(Supervisor::new(&config, Arc::clone(&router), tx)),
            router,
        )
    }

    fn crash_lines(router: &LogRouter) -> usize {
        router
            .recent(100, &["api".to_string()])
            .iter()
            .filter(|l| l.stream == StreamKind::Status && l.text.starts_with("crashed"))
            .count()
    }

    #[tokio::test]
    async fn test_crash_marks_failed_once() {
        let dir = tempfile::tempdir().unwrap();
        let (sup, router) = supervisor(dir.path(), "sleep 0.4; exit 3");
        assert!(sup.start_all(false).await.all_ready());

        tokio::time::sleep(Duration::from_millis(600)).await;
        sup.poll_once().await;
        sup.poll_once().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = sup.registry().by_name("api").unwrap().state();
        assert_eq!(state.status, ServiceStatus::Failed);
        assert_eq!(state.failure, Some(FailureReason::Crashed { code: Some(3) }));
        assert_eq!(state.last_exit_code, Some(3));
        assert_eq!(crash_lines(&router), 1);
    }

    #[tokio::test]
    async fn test_clean_exit_marks_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (sup, _router) = supervisor(dir.path(), "sleep 0.4");
        assert!(sup.start_all(false).await.all_ready());

        tokio::time::sleep(Duration::from_millis(600)).await;
        sup.poll_once().await;
        assert_eq!(sup.status()[0].status, ServiceStatus::Stopped);
        assert_eq!(sup.status()[0].last_exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_requested_stop_is_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let (sup, router) = supervisor(dir.path(), "sleep 30");
        sup.start_all(false).await;

        sup.kill(&[]).await.unwrap();
        sup.poll_once().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(sup.status()[0].status, ServiceStatus::Stopped);
        assert_eq!(crash_lines(&router), 0);
    }

    #[tokio::test]
    async fn test_spawned_monitor_detects_crash() {
        let dir = tempfile::tempdir().unwrap();
        let (sup, _router) = supervisor(dir.path(), "sleep 0.3; exit 1");
        sup.start_all(false).await;
        let monitor = sup.spawn_monitor();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(sup.status()[0].status, ServiceStatus::Failed);

        sup.shutdown().await;
        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .unwrap()
            .unwrap();
    }
}
