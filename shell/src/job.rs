//! Job-control state shared with the signal handlers.
//!
//! The handlers installed here only load and store atomics and call `kill(2)`.
//! Printing and reaping happen on the main loop, which polls the flags.

use crate::command::ExitCode;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use signal_hook::consts::{SIGCHLD, SIGINT};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Slot value meaning "no foreground job".
const NO_JOB: i32 = 0;

/// Foreground-job slot plus the flags raised by SIGINT and SIGCHLD.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct JobControl {
    foreground: Arc<AtomicI32>,
    interrupted: Arc<AtomicBool>,
    child_changed: Arc<AtomicBool>,
}

impl JobControl {
    /// Job-control state with no signal handlers attached.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Create the state and install the SIGINT and SIGCHLD handlers.
    ///
    /// SIGINT is forwarded to the foreground job when there is one, so the
    /// shell itself survives Ctrl-C; otherwise it only raises a flag.
    pub fn install() -> io::Result<Self> {
        let jobs = Self::default();

        let foreground = Arc::clone(&jobs.foreground);
        let interrupted = Arc::clone(&jobs.interrupted);
        // SAFETY: the action only touches atomics and calls kill(2), both
        // async-signal-safe.
        unsafe {
            signal_hook::low_level::register(SIGINT, move || {
                let pid = foreground.load(Ordering::SeqCst);
                if pid > NO_JOB {
                    let _ = kill(Pid::from_raw(pid), Signal::SIGINT);
                } else {
                    interrupted.store(true, Ordering::SeqCst);
                }
            })?;
        }
        signal_hook::flag::register(SIGCHLD, Arc::clone(&jobs.child_changed))?;

        log::debug!("job control handlers installed");
        Ok(jobs)
    }

    /// Record `pid` as the job the shell is waiting on.
    pub fn set_foreground(&self, pid: Pid) {
        self.foreground.store(pid.as_raw(), Ordering::SeqCst);
    }

    pub fn foreground(&self) -> Option<Pid> {
        match self.foreground.load(Ordering::SeqCst) {
            NO_JOB => None,
            pid => Some(Pid::from_raw(pid)),
        }
    }

    /// Block until `pid` terminates, then clear the slot if it still names `pid`.
    pub fn wait_foreground(&self, pid: Pid) -> nix::Result<WaitStatus> {
        let result = loop {
            match waitpid(pid, None) {
                Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                    break Ok(status);
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(e) => break Err(e),
            }
        };
        let _ = self.foreground.compare_exchange(
            pid.as_raw(),
            NO_JOB,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        result
    }

    /// Consume the "SIGINT with no foreground job" flag.
    pub fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Reap background jobs that finished since the last call.
    ///
    /// Does nothing while a foreground job is recorded: that reap belongs to
    /// [`JobControl::wait_foreground`]. Signals coalesce, so one raised flag
    /// drains every exited child.
    pub fn reap_background(&self) -> Vec<BackgroundNotice> {
        if self.foreground().is_some() || !self.child_changed.swap(false, Ordering::SeqCst) {
            return Vec::new();
        }

        let mut notices = Vec::new();
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
                Ok(status) => {
                    if let Some(pid) = status.pid() {
                        log::debug!("reaped background job {pid}: {status:?}");
                        notices.push(BackgroundNotice {
                            pid,
                            code: exit_code(status),
                        });
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    log::warn!("waitpid failed while reaping: {e}");
                    break;
                }
            }
        }
        notices
    }
}

/// A background job that has terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundNotice {
    pub pid: Pid,
    pub code: ExitCode,
}

impl fmt::Display for BackgroundNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            write!(f, "[{}] done", self.pid)
        } else {
            write!(f, "[{}] exit {}", self.pid, self.code)
        }
    }
}

/// Shell-style exit code for a terminated process.
///
/// Processes killed by a signal report `128 + signal`.
pub fn exit_code(status: WaitStatus) -> ExitCode {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => -1,
    }
}
