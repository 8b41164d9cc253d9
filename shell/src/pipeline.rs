//! Process construction for one command group.
//!
//! The shell forks a single top-level process for the tail stage. That process
//! forks the stage feeding it, which forks the one before it, down to the head.
//! Each stage waits until its upstream has exec'd (not exited) before exec'ing
//! itself; data then flows through ordinary pipe buffering.
//!
//! Code running after `fork` only reads the [`PipelinePlan`] and issues raw
//! syscalls. Failures there are reported on fd 2 and end that process only.

use crate::plan::{Endpoint, PipelinePlan, StagePlan};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl, open};
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::stat::Mode;
use nix::unistd::{ForkResult, Pid, close, dup2, fork, pipe2, read, setpgid, write};
use std::ffi::CStr;
use std::os::fd::{AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};

/// Exit status of a stage whose program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit status of a stage that was found but could not be exec'd, or whose
/// pipe or fork failed.
pub const EXIT_CANNOT_RUN: i32 = 126;
/// Exit status of a stage whose redirection file could not be opened.
pub const EXIT_REDIRECT: i32 = 1;

const STDIN: RawFd = libc::STDIN_FILENO;
const STDOUT: RawFd = libc::STDOUT_FILENO;
const STDERR: RawFd = libc::STDERR_FILENO;

/// Fork the top-level process for `plan` and start constructing the pipeline in it.
///
/// Returns the pid of the tail stage, whose exit status is the pipeline's status.
/// Background pipelines are moved into their own process group.
pub fn launch(plan: &PipelinePlan) -> nix::Result<Pid> {
    if plan.is_empty() {
        return Err(Errno::EINVAL);
    }
    // SAFETY: the child only reads `plan` and makes async-signal-safe calls
    // until it execs or exits.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            if plan.background() {
                // Also done by the child; whichever runs first wins the race.
                let _ = setpgid(child, child);
            }
            log::debug!("launched {} stage(s) with tail pid {child}", plan.len());
            Ok(child)
        }
        ForkResult::Child => {
            if plan.background() {
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
            }
            restore_default_signals();
            run_stage(plan, plan.len() - 1, None, None)
        }
    }
}

/// Build stage `index` in the current (already forked) process and exec it.
///
/// `downstream` is the write end of the pipe read by the next stage.
/// `exec_notify` is a close-on-exec descriptor the downstream stage reads to
/// learn that this stage has exec'd: it sees EOF once the descriptor closes.
fn run_stage(
    plan: &PipelinePlan,
    index: usize,
    downstream: Option<OwnedFd>,
    exec_notify: Option<OwnedFd>,
) -> ! {
    let stage = &plan.stages()[index];

    if let Some(fd) = downstream {
        if let Err(e) = attach(fd, STDOUT) {
            die(&[b"dup2 failed: ", e.desc().as_bytes()], EXIT_CANNOT_RUN);
        }
    }

    if index > 0 {
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC)
            .unwrap_or_else(|e| die(&[b"pipe failed: ", e.desc().as_bytes()], EXIT_CANNOT_RUN));
        let (ready_read, ready_write) = pipe2(OFlag::O_CLOEXEC)
            .unwrap_or_else(|e| die(&[b"pipe failed: ", e.desc().as_bytes()], EXIT_CANNOT_RUN));

        // SAFETY: as in `launch`, the child never returns into shell logic.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                drop(read_end);
                drop(ready_read);
                drop(exec_notify);
                run_stage(plan, index - 1, Some(write_end), Some(ready_write));
            }
            Ok(ForkResult::Parent { .. }) => {
                drop(write_end);
                drop(ready_write);
                if let Err(e) = attach(read_end, STDIN) {
                    die(&[b"dup2 failed: ", e.desc().as_bytes()], EXIT_CANNOT_RUN);
                }
                wait_for_exec(&ready_read);
            }
            Err(e) => die(&[b"fork failed: ", e.desc().as_bytes()], EXIT_CANNOT_RUN),
        }
    }

    apply_files(stage);
    exec(stage)
}

/// Make `fd` available as `target` and close the original descriptor number.
fn attach(fd: OwnedFd, target: RawFd) -> nix::Result<()> {
    if fd.as_raw_fd() == target {
        // Already in place; keep it open across exec.
        let raw = fd.into_raw_fd();
        fcntl(raw, FcntlArg::F_SETFD(FdFlag::empty()))?;
        return Ok(());
    }
    dup2(fd.as_raw_fd(), target)?;
    Ok(())
}

/// Block until the upstream stage has exec'd or exited.
fn wait_for_exec(ready: &OwnedFd) {
    let mut buf = [0u8; 1];
    loop {
        match read(ready.as_raw_fd(), &mut buf) {
            Ok(0) => return,
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(_) => return,
        }
    }
}

/// Open the stage's file endpoints: stdout, then stderr, then stdin.
fn apply_files(stage: &StagePlan) {
    let write_flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
    let redirections = [
        (&stage.stdout, STDOUT, write_flags),
        (&stage.stderr, STDERR, write_flags),
        (&stage.stdin, STDIN, OFlag::O_RDONLY),
    ];
    for (endpoint, target, flags) in redirections {
        if let Endpoint::File(path) = endpoint {
            if let Err(e) = redirect(path, flags, target) {
                die(&[path.to_bytes(), b": ", e.desc().as_bytes()], EXIT_REDIRECT);
            }
        }
    }
}

fn redirect(path: &CStr, flags: OFlag, target: RawFd) -> nix::Result<()> {
    let fd = open(path, flags, Mode::from_bits_truncate(0o644))?;
    if fd != target {
        dup2(fd, target)?;
        close(fd)?;
    }
    Ok(())
}

/// Replace the process image with the stage's program, searching `PATH`.
fn exec(stage: &StagePlan) -> ! {
    // SAFETY: both pointers come from the plan, which holds NUL-terminated
    // strings and a NULL-terminated pointer array that outlive this call.
    unsafe { libc::execvp(stage.program().as_ptr(), stage.argv_ptrs()) };
    let program = stage.program().to_bytes();
    match Errno::last() {
        Errno::ENOENT => die(&[program, b": command not found"], EXIT_NOT_FOUND),
        e => die(&[program, b": ", e.desc().as_bytes()], EXIT_CANNOT_RUN),
    }
}

fn restore_default_signals() {
    // SAFETY: installing SIG_DFL does not run any handler code.
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal(Signal::SIGCHLD, SigHandler::SigDfl);
    }
}

/// Print `pipesh: <parts>` on fd 2 without allocating and end the process.
fn die(parts: &[&[u8]], code: i32) -> ! {
    // SAFETY: fd 2 is only borrowed for the writes below.
    let stderr = unsafe { BorrowedFd::borrow_raw(STDERR) };
    let _ = write(stderr, b"pipesh: ");
    for part in parts {
        let _ = write(stderr, part);
    }
    let _ = write(stderr, b"\n");
    // SAFETY: _exit(2) skips atexit handlers and stdio flushing, which must
    // not run in a forked copy of the shell.
    unsafe { libc::_exit(code) }
}
