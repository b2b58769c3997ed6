//! Environment handed to child processes.

use crate::errors::LaunchError;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::process::Command;

/// Variables to set and remove on top of the supervisor's own environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildEnv {
    pub set: BTreeMap<String, String>,
    pub unset: Vec<String>,
}

impl ChildEnv {
    /// Build the environment for one service.
    ///
    /// Precedence, lowest first: runner-wide `env`, the `DEVRUNNER_*` markers,
    /// the service's `env_file`, the service's own `env` table.
    pub fn for_service(
        &self,
        service: &str,
        env_file: Option<&Path>,
        service_env: &BTreeMap<String, String>,
    ) -> Result<ChildEnv, LaunchError> {
        let mut env = self.clone();
        env.set
            .insert("DEVRUNNER_SERVICE".to_string(), service.to_string());
        if let Some(user) = login_user() {
            env.set.insert("DEVRUNNER_USER".to_string(), user);
        }

        if let Some(path) = env_file {
            let entries = dotenvy::from_path_iter(path).map_err(|e| LaunchError::EnvFile {
                service: service.to_string(),
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            for entry in entries {
                let (key, value) = entry.map_err(|e| LaunchError::EnvFile {
                    service: service.to_string(),
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                env.set.insert(key, value);
            }
        }

        for (key, value) in service_env {
            env.set.insert(key.clone(), value.clone());
        }

        // A variable explicitly set for the child wins over a runner-wide removal.
        env.unset.retain(|key| !env.set.contains_key(key));
        Ok(env)
    }

    /// Apply removals then assignments to a command.
    pub fn apply(&self, cmd: &mut Command) {
        for key in &self.unset {
            cmd.env_remove(key);
        }
        cmd.envs(&self.set);
    }
}

fn login_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn base() -> ChildEnv {
        ChildEnv {
            set: BTreeMap::from([("PYTHONUNBUFFERED".to_string(), "1".to_string())]),
            unset: vec!["VIRTUAL_ENV".to_string(), "PORT".to_string()],
        }
    }

    #[test]
    fn test_service_marker_is_set() {
        let env = base().for_service("api", None, &BTreeMap::new()).unwrap();
        assert_eq!(env.set.get("DEVRUNNER_SERVICE").map(String::as_str), Some("api"));
        assert_eq!(env.set.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert!(env.unset.contains(&"VIRTUAL_ENV".to_string()));
    }

    #[test]
    fn test_service_env_overrides_env_file() {
        let dir = tempdir().unwrap();
        let env_file = dir.path().join(".env");
        fs::write(&env_file, "PORT=5000\nDEBUG=1\n").unwrap();

        let service_env = BTreeMap::from([("PORT".to_string(), "5001".to_string())]);
        let env = base()
            .for_service("api", Some(&env_file), &service_env)
            .unwrap();

        assert_eq!(env.set.get("PORT").map(String::as_str), Some("5001"));
        assert_eq!(env.set.get("DEBUG").map(String::as_str), Some("1"));
        // PORT is set explicitly, so the runner-wide removal no longer applies.
        assert!(!env.unset.contains(&"PORT".to_string()));
    }

    #[test]
    fn test_missing_env_file_is_launch_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.env");
        let err = base()
            .for_service("api", Some(&missing), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, LaunchError::EnvFile { .. }));
    }
}
