//! Typed error hierarchy for devrunner.
//!
//! Four top-level enums cover the places a run can go wrong:
//! - `ConfigError`: invalid configuration, fatal before any child is launched
//! - `LaunchError`: a service command could not be started, recorded on the service
//! - `SelectorError`: a shell selector resolved to nothing useful, reported only
//! - `ShellError`: a shell line could not be parsed
//!
//! Crashes and shutdown timeouts are outcomes the supervisor records
//! (`FailureReason::Crashed`, `StopOutcome::Forced`), not errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors found while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No services configured")]
    NoServices,

    #[error("Service #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("Service name '{name}' is reserved for devrunner's own status lines")]
    ReservedName { name: String },

    #[error("Log path {path} of service '{service}' collides with devrunner's own log files")]
    ReservedLogPath { service: String, path: PathBuf },

    #[error("Duplicate service name: {name}")]
    DuplicateService { name: String },

    #[error("Service '{service}' has an empty start_command")]
    MissingStartCommand { service: String },

    #[error("Unknown dependency '{dependency}' in service '{service}': no service with that name exists")]
    UnknownDependency { service: String, dependency: String },

    #[error("Service '{service}' depends on itself")]
    SelfDependency { service: String },

    #[error("Cycle detected in service dependencies. Involved services: {services:?}")]
    CyclicDependency { services: Vec<String> },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors raised when a service command cannot be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to spawn '{command}' for {service}: {source}")]
    Spawn {
        service: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working directory {path} for {service} does not exist")]
    MissingWorkingDir { service: String, path: PathBuf },

    #[error("Failed to load env file {path} for {service}: {message}")]
    EnvFile {
        service: String,
        path: PathBuf,
        message: String,
    },
}

/// Errors from resolving a shell selector against the registered services.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("No service matches {}", .tokens.join(", "))]
    NoMatch { tokens: Vec<String> },

    #[error("Nothing to {action}: {reason}")]
    NotApplicable { action: String, reason: String },
}

/// Errors from parsing a line typed at the shell prompt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShellError {
    #[error("Unknown command '{0}'. Type 'help' for the list of commands.")]
    UnknownCommand(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_read_carries_path() {
        let path = PathBuf::from("/work/devrunner.toml");
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ConfigError::Read {
            path: path.clone(),
            source: io_err,
        };
        match &err {
            ConfigError::Read { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected Read variant"),
        }
        assert!(err.to_string().contains("/work/devrunner.toml"));
    }

    #[test]
    fn config_error_cycle_lists_services() {
        let err = ConfigError::CyclicDependency {
            services: vec!["api".to_string(), "search-api".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Cycle"));
        assert!(msg.contains("search-api"));
    }

    #[test]
    fn launch_error_spawn_is_matchable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = LaunchError::Spawn {
            service: "api".to_string(),
            command: "make run".to_string(),
            source: io_err,
        };
        match &err {
            LaunchError::Spawn { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Spawn variant"),
        }
        assert!(err.to_string().contains("make run"));
    }

    #[test]
    fn selector_no_match_joins_tokens() {
        let err = SelectorError::NoMatch {
            tokens: vec!["nope".to_string(), "zilch".to_string()],
        };
        assert_eq!(err.to_string(), "No service matches nope, zilch");
    }

    #[test]
    fn shell_error_mentions_help() {
        let err = ShellError::UnknownCommand("launch".to_string());
        assert!(err.to_string().contains("'launch'"));
        assert!(err.to_string().contains("help"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigError::NoServices);
        assert_std_error(&LaunchError::MissingWorkingDir {
            service: "api".into(),
            path: PathBuf::from("/nope"),
        });
        assert_std_error(&SelectorError::NoMatch { tokens: vec![] });
        assert_std_error(&ShellError::UnknownCommand("x".into()));
    }
}
