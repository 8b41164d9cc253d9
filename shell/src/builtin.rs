use crate::env::Environment;
use crate::interpreter::{Factory, Outcome};
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins run directly in the shell process, so their side effects (like
/// changing directory) persist. Arguments are taken verbatim: a leading `-`
/// is an ordinary operand, not an option.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "cd" or "exit".
    fn name() -> &'static str;

    /// Builds the command from the words following its name.
    fn from_args(args: &[&str]) -> Self;

    /// Executes the command against the shell's environment.
    fn execute(self, env: &mut Environment) -> Result<Outcome>;
}

/// Object-safe form of a parsed builtin, ready to run.
pub trait ExecutableBuiltin {
    fn execute(self: Box<Self>, env: &mut Environment) -> Result<Outcome>;
}

impl<T: BuiltinCommand> ExecutableBuiltin for T {
    fn execute(self: Box<Self>, env: &mut Environment) -> Result<Outcome> {
        T::execute(*self, env)
    }
}

/// Factory that tries to create a builtin from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`; the command is
/// then spawned as an external program.
pub trait BuiltinFactory {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableBuiltin>>;
}

impl<T: BuiltinCommand + 'static> BuiltinFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableBuiltin>> {
        if name != T::name() {
            return None;
        }
        Some(Box::new(T::from_args(args)))
    }
}

/// Change the current working directory.
///
/// Takes at most one target, absolute or relative to the current directory.
/// Without one it changes to `$HOME`.
pub struct Cd {
    pub targets: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_args(args: &[&str]) -> Self {
        Self {
            targets: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn execute(self, env: &mut Environment) -> Result<Outcome> {
        let target = match self.targets.as_slice() {
            [] => env.home_dir().context("cd")?,
            [target] => PathBuf::from(target),
            _ => anyhow::bail!("cd: too many arguments"),
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't resolve {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        log::debug!("cwd is now {}", canonical.display());
        env.current_dir = canonical;
        Ok(Outcome::Finished)
    }
}

/// Exit the shell with status 0. Arguments are ignored.
pub struct Exit;

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn from_args(_args: &[&str]) -> Self {
        Exit
    }

    fn execute(self, _env: &mut Environment) -> Result<Outcome> {
        Ok(Outcome::Exit)
    }
}
