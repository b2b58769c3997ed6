//! Configuration for devrunner.
//!
//! Configuration is read once at start-up from `devrunner.toml` and never
//! hot-reloaded. Settings are layered file → environment → CLI:
//!
//! - `DEVRUNNER_LOG_DIR` overrides `runner.log_dir`
//! - `DEVRUNNER_STOP_GRACE_SECS` overrides `runner.stop_grace_secs`
//! - `--log-dir` and `--filter` override both
//!
//! # Configuration File Format
//!
//! ```toml
//! [runner]
//! log_dir = "logs"
//! monitor_interval_ms = 1000
//! stop_grace_secs = 5
//! ring_capacity = 1000
//! default_grace_ms = 1500
//! filter = []
//! unset_env = ["VIRTUAL_ENV"]
//!
//! [runner.env]
//! PYTHONUNBUFFERED = "1"
//!
//! [[service]]
//! name = "api"
//! working_dir = "../api"
//! start_command = "make run-app"
//! rebuild_command = "make run-all"
//!
//! [service.readiness]
//! kind = "tcp"
//! port = 5000
//!
//! [[service]]
//! name = "buyer-frontend"
//! working_dir = "../buyer-frontend"
//! start_command = "make run-app"
//! depends_on = ["api"]
//! frontend = true
//! frontend_command = "make frontend-build"
//! ```

use crate::errors::ConfigError;
use crate::graph::{GraphBuilder, ServiceGraph};
use crate::logging::RUNNER_LOG;
use crate::process::ChildEnv;
use crate::router::{COMBINED_LOG, MANAGER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "devrunner.toml";

/// Readiness policy as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readiness {
    /// Ready once the process has stayed alive for the grace window.
    Grace {
        #[serde(default)]
        grace_ms: Option<u64>,
    },
    /// Ready once the probe command exits 0.
    Command {
        command: String,
        #[serde(default = "default_probe_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_probe_interval_ms")]
        interval_ms: u64,
    },
    /// Ready once a TCP connection to host:port succeeds.
    Tcp {
        #[serde(default = "default_probe_host")]
        host: String,
        port: u16,
        #[serde(default = "default_probe_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_probe_interval_ms() -> u64 {
    500
}

fn default_probe_host() -> String {
    "127.0.0.1".to_string()
}

/// Runner-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSection {
    /// Directory for per-service logs, combined.log and devrunner.log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// How often the monitor polls child liveness
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Time between the graceful signal and the forced kill
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    /// Lines kept in memory for recaps and `logs`
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    /// Readiness grace window for services that do not set one
    #[serde(default = "default_grace_ms")]
    pub default_grace_ms: u64,
    /// Initial terminal filter (selector tokens)
    #[serde(default)]
    pub filter: Vec<String>,
    /// Variables set for every child
    #[serde(default = "default_env")]
    pub env: BTreeMap<String, String>,
    /// Variables removed from every child
    #[serde(default = "default_unset_env")]
    pub unset_env: Vec<String>,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

fn default_stop_grace_secs() -> u64 {
    5
}

fn default_ring_capacity() -> usize {
    1000
}

fn default_grace_ms() -> u64 {
    1500
}

fn default_env() -> BTreeMap<String, String> {
    BTreeMap::from([("PYTHONUNBUFFERED".to_string(), "1".to_string())])
}

fn default_unset_env() -> Vec<String> {
    vec!["VIRTUAL_ENV".to_string()]
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            monitor_interval_ms: default_monitor_interval_ms(),
            stop_grace_secs: default_stop_grace_secs(),
            ring_capacity: default_ring_capacity(),
            default_grace_ms: default_grace_ms(),
            filter: Vec::new(),
            env: default_env(),
            unset_env: default_unset_env(),
        }
    }
}

/// One `[[service]]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSection {
    pub name: String,
    /// Working directory, relative to the config file (default: the config directory)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub start_command: String,
    #[serde(default)]
    pub rebuild_command: Option<String>,
    /// Services that must be READY before this one starts
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Log file, relative to the log directory (default: `<name>.log`)
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Whether the `frontend` shell command applies to this service
    #[serde(default)]
    pub frontend: bool,
    #[serde(default)]
    pub frontend_command: Option<String>,
    /// dotenv file loaded into the child environment on every launch
    #[serde(default)]
    pub env_file: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub readiness: Option<Readiness>,
}

impl ServiceSection {
    /// Log file relative to the log directory.
    pub fn log_file(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.log", self.name)))
    }
}

/// The complete devrunner.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerToml {
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceSection>,
}

impl RunnerToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DEVRUNNER_LOG_DIR").filter(|d| !d.is_empty()) {
            self.runner.log_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("DEVRUNNER_STOP_GRACE_SECS") {
            self.runner.stop_grace_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "DEVRUNNER_STOP_GRACE_SECS".to_string(),
                    message: format!("'{}' is not a whole number of seconds", raw),
                })?;
        }
        Ok(())
    }

    /// Check for fatal problems and build the dependency graph.
    pub fn check(&self) -> Result<ServiceGraph, ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }
        if self.runner.ring_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "runner.ring_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.runner.monitor_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "runner.monitor_interval_ms".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        for (index, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if service.name.eq_ignore_ascii_case(MANAGER) {
                return Err(ConfigError::ReservedName {
                    name: service.name.clone(),
                });
            }
            let log_file = service.log_file();
            let relative: PathBuf = log_file
                .components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect();
            if relative == Path::new(COMBINED_LOG) || relative == Path::new(RUNNER_LOG) {
                return Err(ConfigError::ReservedLogPath {
                    service: service.name.clone(),
                    path: log_file,
                });
            }
            if service.start_command.trim().is_empty() {
                return Err(ConfigError::MissingStartCommand {
                    service: service.name.clone(),
                });
            }
            match &service.readiness {
                Some(Readiness::Command { command, .. }) if command.trim().is_empty() => {
                    return Err(ConfigError::InvalidValue {
                        field: format!("service.{}.readiness.command", service.name),
                        message: "probe command is empty".to_string(),
                    });
                }
                Some(Readiness::Tcp { port: 0, .. }) => {
                    return Err(ConfigError::InvalidValue {
                        field: format!("service.{}.readiness.port", service.name),
                        message: "port 0 cannot be probed".to_string(),
                    });
                }
                _ => {}
            }
        }

        self.services
            .iter()
            .fold(GraphBuilder::new(), |builder, s| {
                builder.service(s.name.clone(), &s.depends_on)
            })
            .build()
    }

    /// Non-fatal problems worth telling the user about.
    pub fn validate(&self, config_dir: &Path) -> Vec<String> {
        let mut warnings = Vec::new();

        for service in &self.services {
            if service.frontend
                && service.frontend_command.is_none()
                && service.rebuild_command.is_none()
            {
                warnings.push(format!(
                    "Service '{}' is marked frontend but has neither frontend_command nor rebuild_command",
                    service.name
                ));
            }
            if let Some(dir) = &service.working_dir {
                let resolved = config_dir.join(dir);
                if !resolved.is_dir() {
                    warnings.push(format!(
                        "Working directory for '{}' does not exist: {}",
                        service.name,
                        resolved.display()
                    ));
                }
            }
        }

        warnings
    }
}

/// Resolved readiness policy with concrete durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessPolicy {
    Grace(Duration),
    Command {
        command: String,
        timeout: Duration,
        interval: Duration,
    },
    Tcp {
        host: String,
        port: u16,
        timeout: Duration,
    },
}

/// A fully resolved service definition. Immutable for the life of a run.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub working_dir: PathBuf,
    pub start_command: String,
    pub rebuild_command: Option<String>,
    /// `frontend_command`, or `rebuild_command` when unset; `None` unless `frontend = true`
    pub frontend_command: Option<String>,
    pub frontend: bool,
    pub depends_on: Vec<String>,
    pub log_path: PathBuf,
    pub env_file: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub readiness: ReadinessPolicy,
}

/// CLI-level overrides applied last.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_dir: Option<PathBuf>,
    pub filter: Option<Vec<String>>,
}

/// Runtime configuration handed to the supervisor and log router.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub monitor_interval: Duration,
    pub stop_grace: Duration,
    pub ring_capacity: usize,
    pub filter: Vec<String>,
    pub env: ChildEnv,
    pub services: Vec<ServiceSpec>,
    pub graph: ServiceGraph,
}

impl RunnerConfig {
    /// Load, layer, validate and resolve the config file at `path`.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut toml = RunnerToml::load(path)?;
        toml.apply_env(|key| std::env::var(key).ok())?;

        let config_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let config_dir = config_dir.canonicalize().unwrap_or(config_dir);

        Self::from_toml(toml, &config_dir, overrides)
    }

    /// Resolve an already-parsed file. Relative paths resolve against `config_dir`.
    pub fn from_toml(
        toml: RunnerToml,
        config_dir: &Path,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let graph = toml.check()?;
        let runner = toml.runner;

        let log_dir = config_dir.join(overrides.log_dir.as_ref().unwrap_or(&runner.log_dir));
        let default_grace = Duration::from_millis(runner.default_grace_ms);

        let services = toml
            .services
            .into_iter()
            .map(|s| {
                let readiness = match s.readiness.clone() {
                    None => ReadinessPolicy::Grace(default_grace),
                    Some(Readiness::Grace { grace_ms }) => ReadinessPolicy::Grace(
                        grace_ms.map(Duration::from_millis).unwrap_or(default_grace),
                    ),
                    Some(Readiness::Command {
                        command,
                        timeout_secs,
                        interval_ms,
                    }) => ReadinessPolicy::Command {
                        command,
                        timeout: Duration::from_secs(timeout_secs),
                        interval: Duration::from_millis(interval_ms.max(1)),
                    },
                    Some(Readiness::Tcp {
                        host,
                        port,
                        timeout_secs,
                    }) => ReadinessPolicy::Tcp {
                        host,
                        port,
                        timeout: Duration::from_secs(timeout_secs),
                    },
                };

                let frontend_command = if s.frontend {
                    s.frontend_command.clone().or_else(|| s.rebuild_command.clone())
                } else {
                    None
                };

                ServiceSpec {
                    log_path: log_dir.join(s.log_file()),
                    working_dir: s
                        .working_dir
                        .as_ref()
                        .map(|d| config_dir.join(d))
                        .unwrap_or_else(|| config_dir.to_path_buf()),
                    env_file: s.env_file.as_ref().map(|f| config_dir.join(f)),
                    name: s.name,
                    start_command: s.start_command,
                    rebuild_command: s.rebuild_command,
                    frontend_command,
                    frontend: s.frontend,
                    depends_on: s.depends_on,
                    env: s.env,
                    readiness,
                }
            })
            .collect();

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            log_dir,
            monitor_interval: Duration::from_millis(runner.monitor_interval_ms),
            stop_grace: Duration::from_secs(runner.stop_grace_secs),
            ring_capacity: runner.ring_capacity,
            filter: overrides.filter.clone().unwrap_or(runner.filter),
            env: ChildEnv {
                set: runner.env,
                unset: runner.unset_env,
            },
            services,
            graph,
        })
    }

    /// Service names in registration order.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }
}

/// Annotated starter file written by `devrunner config init`.
pub const EXAMPLE_CONFIG: &str = r#"# devrunner configuration
#
# Each [[service]] is started with `sh -c <start_command>` inside its working_dir.
# Services start only after everything in depends_on is READY.

[runner]
log_dir = "logs"
monitor_interval_ms = 1000
stop_grace_secs = 5
ring_capacity = 1000
default_grace_ms = 1500
filter = []
unset_env = ["VIRTUAL_ENV"]

[runner.env]
PYTHONUNBUFFERED = "1"

[[service]]
name = "api"
working_dir = "../api"
start_command = "make run-app"
rebuild_command = "make run-all"

[service.readiness]
kind = "tcp"
port = 5000
timeout_secs = 60

[[service]]
name = "search-api"
working_dir = "../search-api"
start_command = "make run-app"
rebuild_command = "make run-all"

[[service]]
name = "buyer-frontend"
working_dir = "../buyer-frontend"
start_command = "make run-app"
rebuild_command = "make run-all"
depends_on = ["api", "search-api"]
frontend = true
frontend_command = "make frontend-build"

[[service]]
name = "supplier-frontend"
working_dir = "../supplier-frontend"
start_command = "make run-app"
rebuild_command = "make run-all"
depends_on = ["api"]
frontend = true
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn parse(content: &str) -> RunnerToml {
        RunnerToml::parse(content).unwrap()
    }

    // =========================================
    // Parsing tests
    // =========================================

    #[test]
    fn test_parse_defaults() {
        let toml = parse(
            r#"
            [[service]]
            name = "api"
            start_command = "make run"
            "#,
        );

        assert_eq!(toml.runner.log_dir, PathBuf::from("logs"));
        assert_eq!(toml.runner.monitor_interval_ms, 1000);
        assert_eq!(toml.runner.stop_grace_secs, 5);
        assert_eq!(toml.runner.ring_capacity, 1000);
        assert_eq!(toml.runner.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(toml.runner.unset_env, vec!["VIRTUAL_ENV"]);
        assert_eq!(toml.services.len(), 1);
        assert!(toml.services[0].readiness.is_none());
    }

    #[test]
    fn test_parse_readiness_variants() {
        let toml = parse(
            r#"
            [[service]]
            name = "a"
            start_command = "x"
            [service.readiness]
            kind = "grace"
            grace_ms = 250

            [[service]]
            name = "b"
            start_command = "x"
            [service.readiness]
            kind = "command"
            command = "curl -sf localhost:5000/_status"

            [[service]]
            name = "c"
            start_command = "x"
            [service.readiness]
            kind = "tcp"
            port = 9200
            "#,
        );

        assert_eq!(
            toml.services[0].readiness,
            Some(Readiness::Grace { grace_ms: Some(250) })
        );
        assert_eq!(
            toml.services[1].readiness,
            Some(Readiness::Command {
                command: "curl -sf localhost:5000/_status".to_string(),
                timeout_secs: 60,
                interval_ms: 500,
            })
        );
        assert_eq!(
            toml.services[2].readiness,
            Some(Readiness::Tcp {
                host: "127.0.0.1".to_string(),
                port: 9200,
                timeout_secs: 60,
            })
        );
    }

    #[test]
    fn test_example_config_parses_and_checks() {
        let toml = parse(EXAMPLE_CONFIG);
        assert_eq!(toml.services.len(), 4);
        let graph = toml.check().unwrap();
        let order: Vec<&str> = graph
            .topological_order()
            .iter()
            .map(|&i| graph.name(i).unwrap())
            .collect();
        assert_eq!(
            order,
            vec!["api", "search-api", "buyer-frontend", "supplier-frontend"]
        );
    }

    #[test]
    fn test_load_reports_parse_error_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[[service]\nname = ").unwrap();

        let err = RunnerToml::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = RunnerToml::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    // =========================================
    // Validation tests
    // =========================================

    #[test]
    fn test_check_rejects_empty_service_list() {
        assert!(matches!(
            RunnerToml::default().check(),
            Err(ConfigError::NoServices)
        ));
    }

    #[test]
    fn test_check_rejects_missing_start_command() {
        let toml = parse(
            r#"
            [[service]]
            name = "api"
            "#,
        );
        assert!(matches!(
            toml.check(),
            Err(ConfigError::MissingStartCommand { .. })
        ));
    }

    #[test]
    fn test_check_rejects_reserved_service_name() {
        let toml = parse(
            r#"
            [[service]]
            name = "manager"
            start_command = "sleep 30"
            "#,
        );
        match toml.check() {
            Err(ConfigError::ReservedName { name }) => assert_eq!(name, "manager"),
            other => panic!("expected ReservedName, got {:?}", other),
        }
    }

    #[test]
    fn test_check_rejects_log_path_on_shared_files() {
        let toml = parse(
            r#"
            [[service]]
            name = "api"
            start_command = "x"
            log_path = "./combined.log"
            "#,
        );
        assert!(matches!(
            toml.check(),
            Err(ConfigError::ReservedLogPath { .. })
        ));

        // The default log file of a service named `combined` collides too.
        let toml = parse(
            r#"
            [[service]]
            name = "combined"
            start_command = "x"
            "#,
        );
        match toml.check() {
            Err(ConfigError::ReservedLogPath { service, path }) => {
                assert_eq!(service, "combined");
                assert_eq!(path, PathBuf::from("combined.log"));
            }
            other => panic!("expected ReservedLogPath, got {:?}", other),
        }

        let toml = parse(
            r#"
            [[service]]
            name = "api"
            start_command = "x"
            log_path = "api/combined.log"
            "#,
        );
        assert!(toml.check().is_ok());
    }

    #[test]
    fn test_check_rejects_cycle() {
        let toml = parse(
            r#"
            [[service]]
            name = "a"
            start_command = "x"
            depends_on = ["b"]

            [[service]]
            name = "b"
            start_command = "x"
            depends_on = ["a"]
            "#,
        );
        assert!(matches!(
            toml.check(),
            Err(ConfigError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_check_rejects_zero_ring_capacity() {
        let toml = parse(
            r#"
            [runner]
            ring_capacity = 0

            [[service]]
            name = "a"
            start_command = "x"
            "#,
        );
        assert!(matches!(toml.check(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_check_rejects_empty_probe_command() {
        let toml = parse(
            r#"
            [[service]]
            name = "a"
            start_command = "x"
            [service.readiness]
            kind = "command"
            command = "  "
            "#,
        );
        assert!(matches!(toml.check(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_warns_on_frontend_without_command() {
        let dir = tempdir().unwrap();
        let toml = parse(
            r#"
            [[service]]
            name = "buyer-frontend"
            start_command = "x"
            frontend = true
            "#,
        );
        let warnings = toml.validate(dir.path());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("buyer-frontend"));
    }

    #[test]
    fn test_validate_warns_on_missing_working_dir() {
        let dir = tempdir().unwrap();
        let toml = parse(
            r#"
            [[service]]
            name = "api"
            start_command = "x"
            working_dir = "does-not-exist"
            "#,
        );
        let warnings = toml.validate(dir.path());
        assert!(warnings.iter().any(|w| w.contains("does-not-exist")));
    }

    // =========================================
    // Layering tests
    // =========================================

    #[test]
    fn test_env_overrides_file() {
        let mut toml = parse(
            r#"
            [runner]
            log_dir = "from-file"
            stop_grace_secs = 5
            "#,
        );
        let env: HashMap<&str, &str> = HashMap::from([
            ("DEVRUNNER_LOG_DIR", "from-env"),
            ("DEVRUNNER_STOP_GRACE_SECS", "9"),
        ]);
        toml.apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(toml.runner.log_dir, PathBuf::from("from-env"));
        assert_eq!(toml.runner.stop_grace_secs, 9);
    }

    #[test]
    fn test_env_rejects_bad_grace() {
        let mut toml = RunnerToml::default();
        let err = toml
            .apply_env(|k| (k == "DEVRUNNER_STOP_GRACE_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_resolve_paths_and_readiness() {
        let dir = tempdir().unwrap();
        let toml = parse(
            r#"
            [runner]
            default_grace_ms = 700

            [[service]]
            name = "api"
            working_dir = "api"
            start_command = "make run"
            rebuild_command = "make build"
            frontend = true

            [[service]]
            name = "web"
            start_command = "make run"
            log_path = "custom/web.out"
            depends_on = ["api"]
            "#,
        );
        let config = RunnerConfig::from_toml(toml, dir.path(), &ConfigOverrides::default()).unwrap();

        let api = &config.services[0];
        assert_eq!(api.working_dir, dir.path().join("api"));
        assert_eq!(api.log_path, dir.path().join("logs").join("api.log"));
        assert_eq!(api.readiness, ReadinessPolicy::Grace(Duration::from_millis(700)));
        assert_eq!(api.frontend_command.as_deref(), Some("make build"));

        let web = &config.services[1];
        assert_eq!(web.working_dir, dir.path());
        assert_eq!(web.log_path, dir.path().join("logs/custom/web.out"));
        assert!(web.frontend_command.is_none());

        assert_eq!(config.service_names(), vec!["api", "web"]);
        assert_eq!(config.graph.topological_order(), &[0, 1]);
    }

    #[test]
    fn test_cli_overrides_win() {
        let dir = tempdir().unwrap();
        let toml = parse(
            r#"
            [runner]
            filter = ["api"]

            [[service]]
            name = "api"
            start_command = "x"
            "#,
        );
        let overrides = ConfigOverrides {
            log_dir: Some(PathBuf::from("/tmp/elsewhere")),
            filter: Some(vec!["web".to_string()]),
        };
        let config = RunnerConfig::from_toml(toml, dir.path(), &overrides).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(config.filter, vec!["web"]);
    }
}
