//! Service supervisor.
//!
//! The supervisor owns the [`ServiceRegistry`] and is the only writer of a
//! service's status. Control-plane calls come from the shell; output and
//! status lines go to the log router over one channel.
//!
//! # Start-up
//!
//! [`Supervisor::start_all`] keeps a ready queue over the dependency graph:
//! a service is launched as soon as every dependency is READY, so independent
//! branches of the graph come up in parallel. When a service fails, every
//! service that depends on it (directly or transitively) is marked FAILED with
//! [`FailureReason::Dependency`] and never launched.
//!
//! # Crashes
//!
//! The monitor task (see [`Supervisor::spawn_monitor`]) notices exits and
//! records them. Nothing is restarted automatically.

mod branch;
mod monitor;
mod readiness;

pub use branch::{format_age, read_branch};
pub use readiness::describe_exit;

use crate::config::RunnerConfig;
use crate::errors::SelectorError;
use crate::graph::{ServiceGraph, ServiceIndex};
use crate::process::{ChildEnv, ProcessHandle, ProcessState, StopOutcome, run_to_completion};
use crate::registry::{
    FailureReason, ServiceEntry, ServiceRegistry, ServiceSnapshot, ServiceStatus,
};
use crate::router::{LogLine, LogRouter};
use crate::selector::{self, Selection};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// What happened to one service during a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ready,
    Failed(FailureReason),
    Stopped { forced: bool },
    /// Nothing to stop.
    AlreadyDown,
    /// A background build was launched.
    BuildStarted,
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    pub service: String,
    pub outcome: Outcome,
}

/// Result of a supervisor command, for the shell to render.
#[derive(Debug, Clone, Default)]
pub struct ActionReport {
    pub outcomes: Vec<ServiceOutcome>,
    /// Selector tokens that matched nothing.
    pub unmatched: Vec<String>,
}

impl ActionReport {
    fn push(&mut self, service: &str, outcome: Outcome) {
        self.outcomes.push(ServiceOutcome {
            service: service.to_string(),
            outcome,
        });
    }

    pub fn ready(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::Ready)
            .map(|o| o.service.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed(_)))
            .map(|o| o.service.as_str())
            .collect()
    }

    pub fn all_ready(&self) -> bool {
        self.outcomes.iter().all(|o| o.outcome == Outcome::Ready)
    }
}

/// Result of a full shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub stopped: Vec<String>,
    /// Services that ignored SIGTERM for the whole grace period.
    pub forced: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.forced.is_empty()
    }
}

/// Owns every service process and its status.
#[derive(Debug)]
pub struct Supervisor {
    registry: ServiceRegistry,
    graph: ServiceGraph,
    env: ChildEnv,
    router: Arc<LogRouter>,
    log_tx: mpsc::Sender<LogLine>,
    stop_grace: Duration,
    monitor_interval: Duration,
    shutting_down: AtomicBool,
    /// Untracked one-shot builds started by `frontend`, stopped at shutdown.
    builds: Arc<Mutex<Vec<Arc<ProcessHandle>>>>,
}

impl Supervisor {
    pub fn new(config: &RunnerConfig, router: Arc<LogRouter>, log_tx: mpsc::Sender<LogLine>) -> Self {
        Self {
            registry: ServiceRegistry::new(config.services.clone()),
            graph: config.graph.clone(),
            env: config.env.clone(),
            router,
            log_tx,
            stop_grace: config.stop_grace,
            monitor_interval: config.monitor_interval,
            shutting_down: AtomicBool::new(false),
            builds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &ServiceGraph {
        &self.graph
    }

    pub fn router(&self) -> &Arc<LogRouter> {
        &self.router
    }

    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Resolve selector tokens against the registered services.
    pub fn select(&self, tokens: &[String]) -> Result<Selection, SelectorError> {
        selector::resolve(&self.registry.names(), tokens)
    }

    /// Point-in-time copy of every service.
    pub fn status(&self) -> Vec<ServiceSnapshot> {
        self.registry.snapshot()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    async fn emit(&self, service: &str, text: impl Into<String>) {
        let _ = self.log_tx.send(LogLine::status(service, text)).await;
    }

    /// Emit a line that belongs to no service.
    pub async fn announce(&self, text: impl Into<String>) {
        let _ = self.log_tx.send(LogLine::manager(text)).await;
    }

    fn entry(&self, index: ServiceIndex) -> &ServiceEntry {
        &self.registry.entries()[index]
    }

    // =========================================
    // StartAll
    // =========================================

    /// Start every service in dependency order. With `rebuild`, each service's
    /// `rebuild_command` runs to completion before its start command.
    ///
    /// The graph is validated when the configuration is loaded, so a cyclic
    /// configuration never reaches this point.
    pub async fn start_all(&self, rebuild: bool) -> ActionReport {
        let order: Vec<ServiceIndex> = self.graph.topological_order().to_vec();
        tracing::info!(services = order.len(), rebuild, "starting all services");

        let mut ready: HashSet<ServiceIndex> = HashSet::new();
        let mut failed: HashSet<ServiceIndex> = HashSet::new();
        let mut launched: HashSet<ServiceIndex> = HashSet::new();
        let mut in_flight = FuturesUnordered::new();

        loop {
            if !self.is_shutting_down() {
                for &index in &order {
                    if launched.contains(&index) {
                        continue;
                    }
                    let deps = self.graph.dependencies(index);
                    if let Some(&dep) = deps.iter().find(|&&d| failed.contains(&d)) {
                        launched.insert(index);
                        failed.insert(index);
                        self.fail_by_dependency(index, dep).await;
                        continue;
                    }
                    if self.graph.dependencies_satisfied(index, &ready) {
                        launched.insert(index);
                        in_flight.push(async move { (index, self.bring_up(index, rebuild).await) });
                    }
                }
            }

            match in_flight.next().await {
                Some((index, true)) => {
                    ready.insert(index);
                }
                Some((index, false)) => {
                    failed.insert(index);
                }
                None => break,
            }
        }

        self.poll_once().await;
        let mut report = ActionReport::default();
        for entry in self.registry.entries() {
            report.push(entry.name(), outcome_of(entry));
        }
        report
    }

    async fn fail_by_dependency(&self, index: ServiceIndex, dep: ServiceIndex) {
        let dep_name = self.graph.name(dep).unwrap_or("?").to_string();
        let entry = self.entry(index);
        entry.set_status(
            ServiceStatus::Failed,
            Some(FailureReason::Dependency(dep_name.clone())),
        );
        self.emit(entry.name(), format!("not started: dependency '{}' failed", dep_name))
            .await;
    }

    /// Optional rebuild, then start. True when the service reached READY.
    async fn bring_up(&self, index: ServiceIndex, rebuild: bool) -> bool {
        let entry = self.entry(index);
        if rebuild
            && let Some(command) = entry.spec.rebuild_command.clone()
            && !self.run_rebuild(entry, &command).await
        {
            return false;
        }
        self.start_one(index).await
    }

    /// Launch one service and wait for its readiness policy.
    async fn start_one(&self, index: ServiceIndex) -> bool {
        let entry = self.entry(index);
        let spec = &entry.spec;

        // A dependency may have died since it reported READY.
        for &dep in self.graph.dependencies(index) {
            self.reap(self.entry(dep)).await;
        }
        if let Some(&dep) = self
            .graph
            .dependencies(index)
            .iter()
            .find(|&&d| self.entry(d).status() != ServiceStatus::Ready)
        {
            self.fail_by_dependency(index, dep).await;
            return false;
        }

        entry.set_status(ServiceStatus::Starting, None);
        self.emit(&spec.name, format!("starting: {}", spec.start_command))
            .await;

        let launched = self
            .env
            .for_service(&spec.name, spec.env_file.as_deref(), &spec.env)
            .and_then(|env| {
                ProcessHandle::spawn(
                    &spec.name,
                    &spec.start_command,
                    &spec.working_dir,
                    &env,
                    self.log_tx.clone(),
                )
                .map(|handle| (env, Arc::new(handle)))
            });

        let (env, handle) = match launched {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(service = %spec.name, error = %e, "launch failed");
                entry.set_status(ServiceStatus::Failed, Some(FailureReason::Launch(e.to_string())));
                self.emit(&spec.name, format!("failed to launch: {}", e)).await;
                return false;
            }
        };

        entry.attach(Arc::clone(&handle));
        if self.is_shutting_down() {
            // Shutdown began while this service was launching.
            entry.detach_if(&handle);
            handle.stop(self.stop_grace).await;
            entry.set_status(ServiceStatus::Stopped, None);
            return false;
        }
        self.emit(&spec.name, format!("started (pid {})", handle.pid()))
            .await;

        match readiness::wait_ready(&spec.readiness, &handle, &spec.working_dir, &env).await {
            Ok(()) => {
                if entry.transition_if(&[ServiceStatus::Starting], ServiceStatus::Ready, None) {
                    self.emit(&spec.name, "ready").await;
                    true
                } else {
                    false
                }
            }
            Err(reason) => {
                let failure = FailureReason::Readiness(reason.clone());
                if entry.transition_if(&[ServiceStatus::Starting], ServiceStatus::Failed, Some(failure))
                {
                    tracing::warn!(service = %spec.name, %reason, "service did not become ready");
                    self.emit(&spec.name, format!("not ready: {}", reason)).await;
                    if handle.is_running() && entry.detach_if(&handle) {
                        handle.stop(self.stop_grace).await;
                    }
                }
                false
            }
        }
    }

    /// Run `rebuild_command` to completion. False (and FAILED) when it fails.
    async fn run_rebuild(&self, entry: &ServiceEntry, command: &str) -> bool {
        let spec = &entry.spec;
        entry.set_status(ServiceStatus::Restarting, None);
        self.emit(&spec.name, format!("rebuilding: {}", command)).await;

        let result = match self
            .env
            .for_service(&spec.name, spec.env_file.as_deref(), &spec.env)
        {
            Ok(env) => {
                run_to_completion(&spec.name, command, &spec.working_dir, &env, self.log_tx.clone())
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(0)) => {
                self.emit(&spec.name, "rebuild complete").await;
                true
            }
            Ok(code) => {
                let failure = FailureReason::Rebuild { code };
                tracing::warn!(service = %spec.name, ?code, "rebuild failed");
                self.emit(&spec.name, format!("rebuild failed: {}", failure)).await;
                entry.set_status(ServiceStatus::Failed, Some(failure));
                false
            }
            Err(e) => {
                tracing::warn!(service = %spec.name, error = %e, "rebuild could not start");
                self.emit(&spec.name, format!("rebuild failed to launch: {}", e))
                    .await;
                entry.set_status(ServiceStatus::Failed, Some(FailureReason::Launch(e.to_string())));
                false
            }
        }
    }

    /// Take the process out of the slot and stop it.
    async fn stop_process(&self, entry: &ServiceEntry) -> Option<StopOutcome> {
        let handle = entry.detach()?;
        let outcome = handle.stop(self.stop_grace).await;
        if let ProcessState::Exited(code) = handle.state() {
            entry.record_exit(code);
        }
        if outcome == StopOutcome::Forced {
            tracing::warn!(service = %entry.name(), "forced kill after grace period");
        }
        Some(outcome)
    }

    // =========================================
    // Restart / Rebuild
    // =========================================

    /// Services a restart-like command applies to. Empty tokens pick the
    /// services that are FAILED or STOPPED.
    fn down_or_selected(
        &self,
        action: &str,
        tokens: &[String],
    ) -> Result<(Vec<ServiceIndex>, Vec<String>), SelectorError> {
        let (indices, unmatched) = if tokens.is_empty() {
            (self.registry.indices_where(|s| s.is_down()), Vec::new())
        } else {
            let sel = self.select(tokens)?;
            (sel.indices, sel.unmatched)
        };
        if indices.is_empty() {
            return Err(SelectorError::NotApplicable {
                action: action.to_string(),
                reason: "no service is FAILED or STOPPED".to_string(),
            });
        }
        Ok((self.graph.order_subset(&indices), unmatched))
    }

    /// Stop and start the selected services, dependencies first.
    pub async fn restart(&self, tokens: &[String]) -> Result<ActionReport, SelectorError> {
        let (indices, unmatched) = self.down_or_selected("restart", tokens)?;
        tracing::info!(?tokens, services = indices.len(), "restart");
        self.restart_indices(&indices, false, unmatched).await
    }

    /// Like restart, but `rebuild_command` runs to completion first. A service
    /// without one is simply restarted.
    pub async fn rebuild(&self, tokens: &[String]) -> Result<ActionReport, SelectorError> {
        let (indices, unmatched) = self.down_or_selected("rebuild", tokens)?;
        tracing::info!(?tokens, services = indices.len(), "rebuild");
        self.restart_indices(&indices, true, unmatched).await
    }

    async fn restart_indices(
        &self,
        indices: &[ServiceIndex],
        rebuild: bool,
        unmatched: Vec<String>,
    ) -> Result<ActionReport, SelectorError> {
        let mut report = ActionReport {
            unmatched,
            ..Default::default()
        };

        for &index in indices {
            if self.is_shutting_down() {
                break;
            }
            let entry = self.entry(index);
            entry.set_status(ServiceStatus::Restarting, None);
            if entry.process().is_some() {
                self.emit(entry.name(), "restarting").await;
                self.stop_process(entry).await;
            }

            let ok = match (&entry.spec.rebuild_command, rebuild) {
                (Some(command), true) => {
                    let command = command.clone();
                    self.run_rebuild(entry, &command).await && self.start_one(index).await
                }
                (None, true) => {
                    self.emit(entry.name(), "no rebuild_command configured, restarting")
                        .await;
                    self.start_one(index).await
                }
                (_, false) => self.start_one(index).await,
            };
            tracing::debug!(service = %entry.name(), ok, "restart finished");
            report.push(entry.name(), outcome_of(entry));
        }

        Ok(report)
    }

    // =========================================
    // Frontend
    // =========================================

    /// Run the frontend build of the selected frontend services in the
    /// background. The services keep running and keep their status.
    pub async fn frontend(&self, tokens: &[String]) -> Result<ActionReport, SelectorError> {
        let (candidates, unmatched) = if tokens.is_empty() {
            ((0..self.registry.len()).collect::<Vec<_>>(), Vec::new())
        } else {
            let sel = self.select(tokens)?;
            (sel.indices, sel.unmatched)
        };
        let targets: Vec<ServiceIndex> = candidates
            .into_iter()
            .filter(|&i| self.entry(i).spec.frontend)
            .collect();
        if targets.is_empty() {
            return Err(SelectorError::NotApplicable {
                action: "build".to_string(),
                reason: "no selected service is a frontend".to_string(),
            });
        }

        let mut report = ActionReport {
            unmatched,
            ..Default::default()
        };
        for index in targets {
            let entry = self.entry(index);
            let outcome = self.start_frontend_build(entry).await;
            report.push(entry.name(), outcome);
        }
        Ok(report)
    }

    async fn start_frontend_build(&self, entry: &ServiceEntry) -> Outcome {
        let spec = &entry.spec;
        let Some(command) = spec.frontend_command.clone() else {
            return Outcome::Skipped("no frontend_command or rebuild_command".to_string());
        };

        let spawned = self
            .env
            .for_service(&spec.name, spec.env_file.as_deref(), &spec.env)
            .and_then(|env| {
                ProcessHandle::spawn(&spec.name, &command, &spec.working_dir, &env, self.log_tx.clone())
            });
        let handle = match spawned {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                self.emit(&spec.name, format!("frontend build failed to launch: {}", e))
                    .await;
                return Outcome::Failed(FailureReason::Launch(e.to_string()));
            }
        };

        self.emit(&spec.name, format!("frontend build started: {}", command))
            .await;
        self.builds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&handle));

        let builds = Arc::clone(&self.builds);
        let tx = self.log_tx.clone();
        let name = spec.name.clone();
        tokio::spawn(async move {
            let text = match handle.wait().await {
                ProcessState::Exited(Some(0)) => "frontend build complete".to_string(),
                ProcessState::Killed => "frontend build stopped".to_string(),
                state => format!("frontend build failed: {}", describe_exit(state)),
            };
            builds
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|b| !Arc::ptr_eq(b, &handle));
            let _ = tx.send(LogLine::status(&name, text)).await;
        });

        Outcome::BuildStarted
    }

    // =========================================
    // Kill / Shutdown
    // =========================================

    /// Stop the selected services (all when `tokens` is empty), dependents
    /// first. Services with nothing running are left alone.
    pub async fn kill(&self, tokens: &[String]) -> Result<ActionReport, SelectorError> {
        let (indices, unmatched) = if tokens.is_empty() {
            ((0..self.registry.len()).collect::<Vec<_>>(), Vec::new())
        } else {
            let sel = self.select(tokens)?;
            (sel.indices, sel.unmatched)
        };
        tracing::info!(?tokens, services = indices.len(), "kill");

        let mut ordered = self.graph.order_subset(&indices);
        ordered.reverse();

        let mut report = ActionReport {
            unmatched,
            ..Default::default()
        };
        for index in ordered {
            let entry = self.entry(index);
            match self.stop_process(entry).await {
                Some(outcome) => {
                    let forced = outcome == StopOutcome::Forced;
                    entry.set_status(ServiceStatus::Stopped, None);
                    self.emit(
                        entry.name(),
                        if forced { "killed (forced after grace period)" } else { "stopped" },
                    )
                    .await;
                    report.push(entry.name(), Outcome::Stopped { forced });
                }
                None => {
                    if !entry.status().is_down() {
                        entry.set_status(ServiceStatus::Stopped, None);
                    }
                    report.push(entry.name(), Outcome::AlreadyDown);
                }
            }
        }
        // Keep registration order for display.
        report
            .outcomes
            .sort_by_key(|o| self.graph.get_index(&o.service).unwrap_or(usize::MAX));
        Ok(report)
    }

    /// Stop everything, concurrently. After this returns no tracked child is alive.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutting_down.store(true, Ordering::SeqCst);
        tracing::info!("shutting down all services");

        let running: Vec<(ServiceIndex, Arc<ProcessHandle>)> = self
            .registry
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.detach().map(|h| (i, h)))
            .collect();
        let builds: Vec<Arc<ProcessHandle>> = self
            .builds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        let grace = self.stop_grace;
        let stops = running
            .iter()
            .map(|(i, h)| async move { (*i, h.stop(grace).await) });
        let (outcomes, _) = futures::future::join(
            futures::future::join_all(stops),
            futures::future::join_all(builds.iter().map(|b| b.stop(grace))),
        )
        .await;

        let mut report = ShutdownReport::default();
        for (index, outcome) in outcomes {
            let entry = self.entry(index);
            entry.set_status(ServiceStatus::Stopped, None);
            report.stopped.push(entry.name().to_string());
            if outcome == StopOutcome::Forced {
                tracing::warn!(service = %entry.name(), "forced kill during shutdown");
                self.emit(entry.name(), "killed (forced after grace period)")
                    .await;
                report.forced.push(entry.name().to_string());
            } else {
                self.emit(entry.name(), "stopped").await;
            }
        }
        for entry in self.registry.entries() {
            if entry.status() == ServiceStatus::Pending {
                entry.set_status(ServiceStatus::Stopped, None);
            }
        }
        report
    }

    // =========================================
    // Branches
    // =========================================

    /// Re-read each service's checked-out branch. Git access runs on the
    /// blocking pool and no registry lock is held while it does.
    pub async fn refresh_branches(&self) {
        let dirs: Vec<std::path::PathBuf> = self
            .registry
            .entries()
            .iter()
            .map(|e| e.spec.working_dir.clone())
            .collect();
        let infos = tokio::task::spawn_blocking(move || {
            dirs.iter()
                .map(|d| read_branch(d).ok())
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_default();

        for (entry, info) in self.registry.entries().iter().zip(infos) {
            entry.set_branch(info);
        }
    }
}

fn outcome_of(entry: &ServiceEntry) -> Outcome {
    let state = entry.state();
    match state.status {
        ServiceStatus::Ready => Outcome::Ready,
        ServiceStatus::Failed => Outcome::Failed(
            state
                .failure
                .unwrap_or(FailureReason::Crashed { code: state.last_exit_code }),
        ),
        ServiceStatus::Stopped => Outcome::Stopped { forced: false },
        other => Outcome::Skipped(format!("status is {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, RunnerToml};
    use crate::router::{Console, LineFormatter};
    use tempfile::TempDir;

    struct Harness {
        supervisor: Arc<Supervisor>,
        _dir: TempDir,
    }

    fn harness(services_toml: &str) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let text = format!(
            "[runner]\nmonitor_interval_ms = 50\nstop_grace_secs = 2\ndefault_grace_ms = 150\n\n{}",
            services_toml
        );
        let toml = RunnerToml::parse(&text).unwrap();
        let config = RunnerConfig::from_toml(toml, dir.path(), &ConfigOverrides::default()).unwrap();
        let router = Arc::new(LogRouter::from_config(
            &config,
            Arc::new(Console::capture()),
            LineFormatter::new(&config.service_names()),
        ));
        let (tx, rx) = LogRouter::channel();
        router.spawn(rx);
        let supervisor = Arc::new(Supervisor::new(&config, Arc::clone(&router), tx));
        Harness {
            supervisor,
            _dir: dir,
        }
    }

    fn tokens(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_start_all_reaches_ready() {
        let h = harness(
            r#"
            [[service]]
            name = "api"
            start_command = "sleep 30"

            [[service]]
            name = "web"
            start_command = "sleep 30"
            depends_on = ["api"]
            "#,
        );
        let report = h.supervisor.start_all(false).await;
        assert!(report.all_ready());
        assert_eq!(report.ready(), vec!["api", "web"]);
        h.supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_dependency_aborts_dependents() {
        let h = harness(
            r#"
            [[service]]
            name = "db"
            start_command = "exit 1"

            [[service]]
            name = "api"
            start_command = "sleep 30"
            depends_on = ["db"]

            [[service]]
            name = "web"
            start_command = "sleep 30"
            depends_on = ["api"]

            [[service]]
            name = "other"
            start_command = "sleep 30"
            "#,
        );
        let report = h.supervisor.start_all(false).await;
        assert_eq!(report.failed(), vec!["db", "api", "web"]);
        assert_eq!(report.ready(), vec!["other"]);

        let api = h.supervisor.registry().by_name("api").unwrap().state();
        assert_eq!(api.failure, Some(FailureReason::Dependency("db".into())));
        let web = h.supervisor.registry().by_name("web").unwrap().state();
        assert_eq!(web.failure, Some(FailureReason::Dependency("api".into())));
        assert!(web.pid.is_none());
        h.supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_launch_failure_is_isolated() {
        let h = harness(
            r#"
            [[service]]
            name = "broken"
            working_dir = "missing-dir"
            start_command = "true"

            [[service]]
            name = "fine"
            start_command = "sleep 30"
            "#,
        );
        let report = h.supervisor.start_all(false).await;
        assert_eq!(report.failed(), vec!["broken"]);
        assert_eq!(report.ready(), vec!["fine"]);
        assert!(matches!(
            h.supervisor.registry().by_name("broken").unwrap().state().failure,
            Some(FailureReason::Launch(_))
        ));
        h.supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_empty_selector_needs_down_service() {
        let h = harness(
            r#"
            [[service]]
            name = "api"
            start_command = "sleep 30"
            "#,
        );
        h.supervisor.start_all(false).await;
        let err = h.supervisor.restart(&[]).await.unwrap_err();
        assert!(matches!(err, SelectorError::NotApplicable { .. }));
        h.supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_rebuild_failure_skips_start() {
        let h = harness(
            r#"
            [[service]]
            name = "api"
            start_command = "sleep 30"
            rebuild_command = "echo compiling; exit 2"
            "#,
        );
        let report = h.supervisor.rebuild(&tokens(&["api"])).await.unwrap();
        assert_eq!(
            report.outcomes[0].outcome,
            Outcome::Failed(FailureReason::Rebuild { code: Some(2) })
        );
        assert!(h.supervisor.registry().by_name("api").unwrap().process().is_none());
        h.supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_frontend_requires_frontend_service() {
        let h = harness(
            r#"
            [[service]]
            name = "api"
            start_command = "sleep 30"
            "#,
        );
        let err = h.supervisor.frontend(&[]).await.unwrap_err();
        assert!(matches!(err, SelectorError::NotApplicable { .. }));
    }

    #[tokio::test]
    async fn test_kill_unknown_selector_is_error() {
        let h = harness(
            r#"
            [[service]]
            name = "api"
            start_command = "sleep 30"
            "#,
        );
        let err = h.supervisor.kill(&tokens(&["nope"])).await.unwrap_err();
        assert!(matches!(err, SelectorError::NoMatch { .. }));
        assert_eq!(h.supervisor.status()[0].status, ServiceStatus::Pending);
    }
}
