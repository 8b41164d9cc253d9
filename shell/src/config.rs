use crate::env::Environment;
use std::path::PathBuf;

/// File name of the history file inside the user's home directory.
pub const HISTORY_FILE: &str = ".pipesh_history";

/// Settings for an interactive session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellConfig {
    /// Where line history is loaded from and saved to; `None` disables history.
    pub history: Option<PathBuf>,
}

impl ShellConfig {
    /// Resolve the session settings from command-line choices and the environment.
    ///
    /// An explicit `history` path wins; otherwise the file lives in `$HOME`.
    /// A missing `HOME` disables history with a single warning instead of
    /// refusing to start.
    pub fn resolve(history: Option<PathBuf>, no_history: bool, env: &Environment) -> Self {
        let history = if no_history {
            None
        } else if history.is_some() {
            history
        } else {
            match env.home_dir() {
                Ok(home) => Some(home.join(HISTORY_FILE)),
                Err(err) => {
                    log::warn!("{err}; history is disabled");
                    None
                }
            }
        };
        Self { history }
    }
}
