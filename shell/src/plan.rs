//! Descriptor plan for a command group.
//!
//! Everything a forked stage needs (argv, file names, which descriptor comes
//! from where) is computed here, before the first `fork`. Forked children then
//! only read this plan and issue syscalls, so they never allocate.

use crate::command::{Command, CommandGroup};
use crate::error::ExecError;
use std::ffi::{CStr, CString, c_char};

/// Where one standard descriptor of a stage comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Left as inherited from the shell.
    Inherit,
    /// Connected to the neighbouring stage through a pipe.
    Pipe,
    /// Opened from the named file (read-only for stdin, create/truncate otherwise).
    File(CString),
}

/// Everything needed to start one stage.
#[derive(Debug)]
pub struct StagePlan {
    argv: Vec<CString>,
    /// NULL-terminated pointers into `argv`, handed to `execvp` as-is.
    argv_ptrs: Vec<*const c_char>,
    pub stdin: Endpoint,
    pub stdout: Endpoint,
    pub stderr: Endpoint,
}

impl StagePlan {
    fn new(command: &Command) -> Result<Self, ExecError> {
        let argv = std::iter::once(&command.name)
            .chain(&command.args)
            .map(|s| CString::new(s.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let argv_ptrs = argv
            .iter()
            .map(|s| s.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        Ok(Self {
            argv,
            argv_ptrs,
            stdin: Endpoint::Inherit,
            stdout: Endpoint::Inherit,
            stderr: Endpoint::Inherit,
        })
    }

    pub fn program(&self) -> &CStr {
        &self.argv[0]
    }

    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    pub(crate) fn argv_ptrs(&self) -> *const *const c_char {
        self.argv_ptrs.as_ptr()
    }
}

/// Immutable plan for a whole command group, stages in shell order.
#[derive(Debug)]
pub struct PipelinePlan {
    stages: Vec<StagePlan>,
    background: bool,
}

impl PipelinePlan {
    /// Build the plan for `group`.
    ///
    /// `<` binds to the head stage, `>` and `2>` bind to the tail stage, and
    /// every adjacent pair of stages is joined by a pipe.
    pub fn build(group: &CommandGroup) -> Result<Self, ExecError> {
        let mut stages = group
            .commands
            .iter()
            .map(StagePlan::new)
            .collect::<Result<Vec<_>, _>>()?;
        let last = stages.len().saturating_sub(1);

        for (i, stage) in stages.iter_mut().enumerate() {
            if i > 0 {
                stage.stdin = Endpoint::Pipe;
            }
            if i < last {
                stage.stdout = Endpoint::Pipe;
            }
        }
        if let Some(head) = stages.first_mut() {
            if let Some(path) = &group.stdin {
                head.stdin = Endpoint::File(CString::new(path.as_str())?);
            }
        }
        if let Some(tail) = stages.last_mut() {
            if let Some(path) = &group.stdout {
                tail.stdout = Endpoint::File(CString::new(path.as_str())?);
            }
            if let Some(path) = &group.stderr {
                tail.stderr = Endpoint::File(CString::new(path.as_str())?);
            }
        }

        Ok(Self {
            stages,
            background: group.background,
        })
    }

    pub fn stages(&self) -> &[StagePlan] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn background(&self) -> bool {
        self.background
    }
}
