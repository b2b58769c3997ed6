//! Per-service records owned by the supervisor.
//!
//! Each [`ServiceEntry`] pairs the immutable [`ServiceSpec`] with mutable state
//! behind its own lock. Locks are held only for the field update itself and
//! never across an `.await`; the process slot hands out `Arc<ProcessHandle>`
//! clones so a stop can be awaited without holding anything.
//!
//! Mutators are crate-private: only the supervisor changes a status.

use crate::config::ServiceSpec;
use crate::process::ProcessHandle;
use chrono::{DateTime, Local};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lifecycle of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Pending,
    Starting,
    Ready,
    Failed,
    Stopped,
    Restarting,
}

impl ServiceStatus {
    /// Statuses an empty `restart`/`rebuild` selector picks up.
    pub fn is_down(&self) -> bool {
        matches!(self, ServiceStatus::Failed | ServiceStatus::Stopped)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Pending => "PENDING",
            ServiceStatus::Starting => "STARTING",
            ServiceStatus::Ready => "READY",
            ServiceStatus::Failed => "FAILED",
            ServiceStatus::Stopped => "STOPPED",
            ServiceStatus::Restarting => "RESTARTING",
        };
        f.pad(s)
    }
}

/// Why a service is FAILED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The command could not be started.
    Launch(String),
    /// Exited while it was expected to run. `None` means killed by a signal.
    Crashed { code: Option<i32> },
    /// Did not become ready.
    Readiness(String),
    /// A dependency failed, so this service was never started.
    Dependency(String),
    /// `rebuild_command` failed.
    Rebuild { code: Option<i32> },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Launch(msg) => write!(f, "launch failed: {}", msg),
            FailureReason::Crashed { code: Some(code) } => write!(f, "exited with code {}", code),
            FailureReason::Crashed { code: None } => write!(f, "killed by signal"),
            FailureReason::Readiness(msg) => write!(f, "not ready: {}", msg),
            FailureReason::Dependency(dep) => write!(f, "dependency '{}' failed", dep),
            FailureReason::Rebuild { code: Some(code) } => {
                write!(f, "rebuild exited with code {}", code)
            }
            FailureReason::Rebuild { code: None } => write!(f, "rebuild was killed"),
        }
    }
}

/// Checked-out revision of a service's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub branch: String,
    pub last_commit: Option<DateTime<Local>>,
}

/// Mutable part of a service record.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub status: ServiceStatus,
    pub failure: Option<FailureReason>,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Local>>,
    pub last_exit_code: Option<i32>,
    pub branch: Option<BranchInfo>,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self {
            status: ServiceStatus::Pending,
            failure: None,
            pid: None,
            started_at: None,
            last_exit_code: None,
            branch: None,
        }
    }
}

/// One configured service.
#[derive(Debug)]
pub struct ServiceEntry {
    pub spec: ServiceSpec,
    state: Mutex<ServiceState>,
    process: Mutex<Option<Arc<ProcessHandle>>>,
}

impl ServiceEntry {
    fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            state: Mutex::new(ServiceState::default()),
            process: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn status(&self) -> ServiceStatus {
        self.lock_state().status
    }

    /// Copy of the current state.
    pub fn state(&self) -> ServiceState {
        self.lock_state().clone()
    }

    /// The live process, if any.
    pub fn process(&self) -> Option<Arc<ProcessHandle>> {
        self.lock_process().clone()
    }

    pub(crate) fn set_status(&self, to: ServiceStatus, failure: Option<FailureReason>) {
        let mut state = self.lock_state();
        let from = state.status;
        state.status = to;
        state.failure = failure;
        drop(state);
        tracing::info!(service = %self.spec.name, %from, %to, "status changed");
    }

    /// Move to `to` only if the current status is one of `from`.
    ///
    /// This is the compare-and-set the monitor and the start path use so that a
    /// crash is recorded exactly once.
    pub(crate) fn transition_if(
        &self,
        from: &[ServiceStatus],
        to: ServiceStatus,
        failure: Option<FailureReason>,
    ) -> bool {
        let mut state = self.lock_state();
        if !from.contains(&state.status) {
            return false;
        }
        let prev = state.status;
        state.status = to;
        state.failure = failure;
        drop(state);
        tracing::info!(service = %self.spec.name, from = %prev, %to, "status changed");
        true
    }

    /// Install a freshly spawned process.
    pub(crate) fn attach(&self, handle: Arc<ProcessHandle>) {
        {
            let mut state = self.lock_state();
            state.pid = Some(handle.pid());
            state.started_at = Some(handle.started_at());
            state.last_exit_code = None;
        }
        *self.lock_process() = Some(handle);
    }

    /// Remove the process from the slot.
    pub(crate) fn detach(&self) -> Option<Arc<ProcessHandle>> {
        let handle = self.lock_process().take();
        if handle.is_some() {
            let mut state = self.lock_state();
            state.pid = None;
            state.started_at = None;
        }
        handle
    }

    /// Remove `handle` from the slot if it is still the one installed.
    pub(crate) fn detach_if(&self, handle: &Arc<ProcessHandle>) -> bool {
        let mut slot = self.lock_process();
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, handle) => {
                *slot = None;
                drop(slot);
                let mut state = self.lock_state();
                state.pid = None;
                state.started_at = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn record_exit(&self, code: Option<i32>) {
        self.lock_state().last_exit_code = code;
    }

    pub(crate) fn set_branch(&self, branch: Option<BranchInfo>) {
        self.lock_state().branch = branch;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_process(&self) -> std::sync::MutexGuard<'_, Option<Arc<ProcessHandle>>> {
        self.process.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Point-in-time copy of one service, safe to hand to the shell.
#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    pub name: String,
    pub status: ServiceStatus,
    pub failure: Option<FailureReason>,
    pub pid: Option<u32>,
    pub uptime: Option<Duration>,
    pub last_exit_code: Option<i32>,
    pub branch: Option<BranchInfo>,
    pub frontend: bool,
}

/// All services in registration order.
#[derive(Debug)]
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new(specs: Vec<ServiceSpec>) -> Self {
        Self {
            entries: specs.into_iter().map(ServiceEntry::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ServiceEntry> {
        self.entries.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.spec.name.clone()).collect()
    }

    /// Indices of services whose status satisfies `pred`.
    pub fn indices_where<F>(&self, pred: F) -> Vec<usize>
    where
        F: Fn(ServiceStatus) -> bool,
    {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| pred(e.status()))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<ServiceSnapshot> {
        let now = Local::now();
        self.entries
            .iter()
            .map(|e| {
                let state = e.state();
                ServiceSnapshot {
                    name: e.spec.name.clone(),
                    status: state.status,
                    failure: state.failure,
                    pid: state.pid,
                    uptime: state
                        .started_at
                        .and_then(|t| (now - t).to_std().ok()),
                    last_exit_code: state.last_exit_code,
                    branch: state.branch,
                    frontend: e.spec.frontend,
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ReadinessPolicy;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    pub(crate) fn spec(name: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            working_dir: PathBuf::from("."),
            start_command: "true".to_string(),
            rebuild_command: None,
            frontend_command: None,
            frontend: false,
            depends_on: Vec::new(),
            log_path: PathBuf::from(format!("{name}.log")),
            env_file: None,
            env: BTreeMap::new(),
            readiness: ReadinessPolicy::Grace(Duration::from_millis(10)),
        }
    }

    #[test]
    fn test_new_services_are_pending() {
        let registry = ServiceRegistry::new(vec![spec("api"), spec("web")]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["api", "web"]);
        assert!(registry
            .entries()
            .iter()
            .all(|e| e.status() == ServiceStatus::Pending));
    }

    #[test]
    fn test_transition_if_only_from_expected() {
        let registry = ServiceRegistry::new(vec![spec("api")]);
        let api = registry.by_name("api").unwrap();
        api.set_status(ServiceStatus::Ready, None);

        let crashed = Some(FailureReason::Crashed { code: Some(1) });
        assert!(api.transition_if(
            &[ServiceStatus::Starting, ServiceStatus::Ready],
            ServiceStatus::Failed,
            crashed.clone()
        ));
        // A second observer of the same crash does nothing.
        assert!(!api.transition_if(
            &[ServiceStatus::Starting, ServiceStatus::Ready],
            ServiceStatus::Failed,
            crashed
        ));
        assert_eq!(api.state().failure, Some(FailureReason::Crashed { code: Some(1) }));
    }

    #[test]
    fn test_indices_where() {
        let registry = ServiceRegistry::new(vec![spec("a"), spec("b"), spec("c")]);
        registry.get(0).unwrap().set_status(ServiceStatus::Failed, None);
        registry.get(2).unwrap().set_status(ServiceStatus::Stopped, None);
        assert_eq!(registry.indices_where(|s| s.is_down()), vec![0, 2]);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let registry = ServiceRegistry::new(vec![spec("api")]);
        let before = registry.snapshot();
        registry.get(0).unwrap().set_status(ServiceStatus::Ready, None);
        assert_eq!(before[0].status, ServiceStatus::Pending);
        assert_eq!(registry.snapshot()[0].status, ServiceStatus::Ready);
        assert!(before[0].uptime.is_none());
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            FailureReason::Crashed { code: Some(2) }.to_string(),
            "exited with code 2"
        );
        assert_eq!(
            FailureReason::Dependency("api".into()).to_string(),
            "dependency 'api' failed"
        );
        assert_eq!(format!("{:<8}|", ServiceStatus::Ready), "READY   |");
    }
}
