use crate::error::EnvError;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: a snapshot of environment variables, consulted for `HOME`.
/// - `current_dir`: the working directory, kept in sync by `cd`.
///
/// Child processes inherit the real process environment; `PATH` lookup is
/// left to `execvp`.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// Get the value of a variable from the shell's snapshot.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The user's home directory, taken from `HOME`.
    ///
    /// An empty `HOME` counts as unset.
    pub fn home_dir(&self) -> Result<PathBuf, EnvError> {
        match self.get_var("HOME") {
            Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
            _ => Err(EnvError::Unset("HOME")),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap(),
        }
    }

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = empty_env();

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    fn test_env_snapshots_process_env() {
        let env = Environment::new();
        assert_eq!(env.get_var("PATH"), stdenv::var("PATH").ok().as_deref());
    }

    #[test]
    fn test_home_dir_follows_set_var() {
        let mut env = empty_env();
        env.set_var("HOME", "/first");
        env.set_var("HOME", "/second");
        assert_eq!(env.home_dir(), Ok(PathBuf::from("/second")));
    }

    #[test]
    fn test_home_dir_unset() {
        let env = empty_env();
        assert_eq!(env.home_dir(), Err(EnvError::Unset("HOME")));
    }

    #[test]
    fn test_home_dir_empty_counts_as_unset() {
        let mut env = empty_env();
        env.set_var("HOME", "");
        assert!(env.home_dir().is_err());
    }

    #[test]
    fn test_home_dir_set() {
        let mut env = empty_env();
        env.set_var("HOME", "/home/someone");
        assert_eq!(env.home_dir(), Ok(PathBuf::from("/home/someone")));
    }
}
