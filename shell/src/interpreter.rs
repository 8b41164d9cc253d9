use crate::builtin::BuiltinFactory;
use crate::command::{Chain, CommandGroup, Connector};
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::error::{Error, ExecError};
use crate::job::{JobControl, exit_code};
use crate::parser;
use crate::pipeline;
use crate::plan::PipelinePlan;
use nix::unistd::Pid;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Factory allows creating instances of builtins.
///
/// Only supports builtins defined in this crate — see [`crate::builtin`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// How a command group or chain finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ran to completion with status 0 (or a builtin succeeded).
    Finished,
    /// Started in the background; the shell is not waiting for it.
    Background(Pid),
    /// `exit` ran: the shell should terminate with status 0.
    Exit,
}

/// An interactive shell: parses lines and runs them as process pipelines.
///
/// The interpreter owns the shell's [`Environment`], the builtin registry and
/// the [`JobControl`] state shared with the signal handlers.
///
/// Example
/// ```
/// use pipesh::Interpreter;
/// let mut sh = Interpreter::default();
/// assert!(sh.run_line("true && echo hello | cat").is_ok());
/// assert!(sh.run_line("false").is_err());
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Vec<Box<dyn BuiltinFactory>>,
    jobs: JobControl,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of builtins.
    pub fn new(builtins: Vec<Box<dyn BuiltinFactory>>, jobs: JobControl) -> Self {
        Self {
            env: Environment::new(),
            builtins,
            jobs,
        }
    }

    /// Create an interpreter with the default builtins (`cd`, `exit`).
    pub fn with_jobs(jobs: JobControl) -> Self {
        use crate::builtin::{Cd, Exit};
        Self::new(
            vec![
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Exit>::default()),
            ],
            jobs,
        )
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn jobs(&self) -> &JobControl {
        &self.jobs
    }

    /// Run one command group.
    ///
    /// A builtin named by the tail stage runs in-process. Anything else is
    /// forked; foreground groups are waited for and a non-zero status becomes
    /// [`ExecError::Failed`], background groups return immediately.
    pub fn execute(&mut self, group: &CommandGroup) -> Result<Outcome, ExecError> {
        let Some(tail) = group.tail() else {
            return Ok(Outcome::Finished);
        };

        let args: Vec<&str> = tail.args.iter().map(String::as_str).collect();
        for factory in &self.builtins {
            if let Some(cmd) = factory.try_create(&tail.name, &args) {
                return Ok(cmd.execute(&mut self.env)?);
            }
        }

        let plan = PipelinePlan::build(group)?;
        let pid = pipeline::launch(&plan).map_err(ExecError::Fork)?;
        if group.background {
            println!("[{pid}]");
            return Ok(Outcome::Background(pid));
        }

        self.jobs.set_foreground(pid);
        let status = self.jobs.wait_foreground(pid).map_err(ExecError::Wait)?;
        log::debug!("foreground job {pid} finished: {status:?}");
        match exit_code(status) {
            0 => Ok(Outcome::Finished),
            code => Err(ExecError::Failed(code)),
        }
    }

    /// Run a chain left to right with `&&` / `||` short-circuiting.
    ///
    /// The result is that of the last group executed.
    pub fn run(&mut self, chain: &Chain) -> Result<Outcome, ExecError> {
        let mut result = Ok(Outcome::Finished);
        for group in chain.groups() {
            result = self.execute(group);
            let proceed = match (&result, group.connector) {
                (Ok(Outcome::Exit), _) | (_, None) => false,
                (Ok(_), Some(Connector::And)) | (Err(_), Some(Connector::Or)) => true,
                (Ok(_), Some(Connector::Or)) | (Err(_), Some(Connector::And)) => false,
            };
            if !proceed {
                break;
            }
            if let Err(e) = &result {
                log::debug!("'{group}' failed, trying the alternative");
                if !matches!(e, ExecError::Failed(_)) {
                    eprintln!("pipesh: {e:#}");
                }
            }
        }
        result
    }

    /// Parse and run one input line.
    pub fn run_line(&mut self, line: &str) -> Result<Outcome, Error> {
        let chain = parser::parse(line)?;
        Ok(self.run(&chain)?)
    }

    /// Read-eval-print loop on the controlling terminal.
    ///
    /// History is loaded once before the first prompt and saved once on the way
    /// out. Returns the process exit code: 0 after `exit`, otherwise 0 if the
    /// history was saved (or is disabled) and 1 if saving failed.
    pub fn repl(&mut self, config: &ShellConfig) -> anyhow::Result<i32> {
        let mut rl = DefaultEditor::new()?;
        if let Some(path) = &config.history {
            if let Err(err) = rl.load_history(path) {
                log::debug!("no history loaded from {}: {err}", path.display());
            }
        }

        let mut exit_requested = false;
        loop {
            self.report_jobs();
            let prompt = format!("{} $ ", self.env.current_dir.display());
            match rl.readline(&prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    match self.run_line(&line) {
                        Ok(Outcome::Exit) => {
                            exit_requested = true;
                            break;
                        }
                        Ok(_) => {}
                        Err(Error::Exec(ExecError::Failed(code))) => {
                            log::debug!("exit status {code}");
                        }
                        Err(e) => eprintln!("pipesh: {e:#}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        let saved = match &config.history {
            Some(path) => match rl.save_history(path) {
                Ok(()) => true,
                Err(err) => {
                    eprintln!("pipesh: can't save history to {}: {err}", path.display());
                    false
                }
            },
            None => true,
        };
        Ok(if exit_requested || saved { 0 } else { 1 })
    }

    /// Print notices for finished background jobs and pending interrupts.
    fn report_jobs(&self) {
        for notice in self.jobs.reap_background() {
            println!("{notice}");
        }
        if self.jobs.take_interrupt() {
            println!();
        }
    }
}

impl Default for Interpreter {
    /// An interpreter with the default builtins and no signal handlers.
    fn default() -> Self {
        Self::with_jobs(JobControl::detached())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::lock_current_dir;
    use nix::sys::signal::{Signal, kill};
    use nix::sys::wait::waitpid;
    use std::env as stdenv;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    fn marker(dir: &Path) -> PathBuf {
        dir.join("marker")
    }

    #[test]
    fn test_and_chain_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(dir.path());
        let mut sh = Interpreter::default();

        let res = sh.run_line(&format!("true && false && touch {}", marker.display()));

        assert!(matches!(res, Err(Error::Exec(ExecError::Failed(1)))));
        assert!(!marker.exists());
    }

    #[test]
    fn test_or_runs_alternative_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(dir.path());
        let mut sh = Interpreter::default();

        let res = sh.run_line(&format!("false || touch {}", marker.display()));

        assert!(matches!(res, Ok(Outcome::Finished)));
        assert!(marker.exists());
    }

    #[test]
    fn test_or_skips_alternative_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(dir.path());
        let mut sh = Interpreter::default();

        let res = sh.run_line(&format!("true || touch {}", marker.display()));

        assert!(matches!(res, Ok(Outcome::Finished)));
        assert!(!marker.exists());
    }

    #[test]
    fn test_failure_before_and_aborts_whole_chain() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(dir.path());
        let mut sh = Interpreter::default();

        // A failure before `&&` ends the chain; a later `||` does not rescue it.
        let res = sh.run_line(&format!("false && true || touch {}", marker.display()));

        assert!(matches!(res, Err(Error::Exec(ExecError::Failed(1)))));
        assert!(!marker.exists());
    }

    #[test]
    fn test_pipeline_output_redirected_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sh = Interpreter::default();

        let res = sh.run_line(&format!("echo hello | tr a-z A-Z > {}", out.display()));

        assert!(res.is_ok());
        assert_eq!(fs::read_to_string(out).unwrap(), "HELLO\n");
    }

    #[test]
    fn test_unknown_program_is_group_failure() {
        let mut sh = Interpreter::default();
        let res = sh.run_line("pipesh-test-no-such-program-xyz");
        assert!(matches!(res, Err(Error::Exec(ExecError::Failed(127)))));
    }

    #[test]
    fn test_parse_error_runs_nothing() {
        let mut sh = Interpreter::default();
        let res = sh.run_line("true |");
        assert!(matches!(res, Err(Error::Parse(_))));
    }

    #[test]
    fn test_blank_line_is_success() {
        let mut sh = Interpreter::default();
        assert!(matches!(sh.run_line("   "), Ok(Outcome::Finished)));
    }

    #[test]
    fn test_exit_stops_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(dir.path());
        let mut sh = Interpreter::default();

        let res = sh.run_line(&format!("exit && touch {}", marker.display()));

        assert!(matches!(res, Ok(Outcome::Exit)));
        assert!(!marker.exists());
    }

    #[test]
    fn test_builtin_is_matched_on_tail_stage() {
        let mut sh = Interpreter::default();
        let res = sh.run_line("echo ignored | exit");
        assert!(matches!(res, Ok(Outcome::Exit)));
    }

    #[test]
    fn test_background_returns_immediately() {
        let mut sh = Interpreter::default();
        let started = Instant::now();

        let res = sh.run_line("sleep 1 &");

        assert!(started.elapsed() < Duration::from_millis(900));
        let Ok(Outcome::Background(pid)) = res else {
            panic!("expected a background job, got {res:?}");
        };
        assert_eq!(sh.jobs().foreground(), None);
        assert_eq!(exit_code(waitpid(pid, None).unwrap()), 0);
    }

    #[test]
    fn test_cd_too_many_args_has_no_side_effect() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut sh = Interpreter::default();

        let res = sh.run_line("cd / /tmp");

        assert!(matches!(res, Err(Error::Exec(ExecError::Builtin(_)))));
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_invalid_path_keeps_cwd() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let mut sh = Interpreter::default();

        let res = sh.run_line(&format!("cd {}", missing.display()));

        assert!(res.is_err());
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_without_args_goes_home() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let canonical_home = fs::canonicalize(home.path()).unwrap();
        let mut sh = Interpreter::default();
        let home_var = canonical_home.to_string_lossy().to_string();
        sh.env_mut().set_var("HOME", home_var);

        let res = sh.run_line("cd");
        let cwd = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert!(res.is_ok());
        assert_eq!(fs::canonicalize(cwd).unwrap(), canonical_home);
        assert_eq!(sh.env().current_dir, canonical_home);
    }

    #[test]
    fn test_failed_builtin_falls_through_or() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(dir.path());
        let mut sh = Interpreter::default();

        let res = sh.run_line(&format!("cd a b || touch {}", marker.display()));

        assert!(res.is_ok());
        assert!(marker.exists());
    }

    #[test]
    fn test_interrupt_reaches_foreground_job_only() {
        let jobs = JobControl::install().unwrap();
        let mut sh = Interpreter::with_jobs(jobs.clone());

        let watcher = std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            while jobs.foreground().is_none() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            // Give the child time to restore its default SIGINT action.
            std::thread::sleep(Duration::from_millis(200));
            kill(nix::unistd::getpid(), Signal::SIGINT).unwrap();
        });

        let started = Instant::now();
        let res = sh.run_line("sleep 10");
        watcher.join().unwrap();

        assert!(matches!(res, Err(Error::Exec(ExecError::Failed(130)))));
        assert!(started.elapsed() < Duration::from_secs(8));
        assert_eq!(sh.jobs().foreground(), None);
    }
}
