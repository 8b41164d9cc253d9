use crate::command::ExitCode;
use thiserror::Error;

/// Malformed operator usage on the command line.
///
/// Every variant carries the operator token it was raised at, so messages
/// read like `parse error near '|'`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// An operator appeared with no command before it (`| wc`, `a && && b`).
    #[error("parse error near '{0}': missing command")]
    MissingCommand(&'static str),
    /// A redirection operator was the last token (`cat >`).
    #[error("parse error near '{0}': missing file name")]
    MissingTarget(&'static str),
    /// A pipe or logical operator ended the line (`ls |`, `true &&`).
    #[error("parse error near '{0}': unexpected end of line")]
    DanglingOperator(&'static str),
}

impl ParseError {
    /// The operator token the error was raised at.
    pub fn operator(&self) -> &'static str {
        match self {
            ParseError::MissingCommand(op)
            | ParseError::MissingTarget(op)
            | ParseError::DanglingOperator(op) => op,
        }
    }
}

/// Missing process environment needed by a feature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("{0} is not set")]
    Unset(&'static str),
}

/// Failures while running a command group.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A builtin rejected its arguments or failed to act.
    #[error(transparent)]
    Builtin(#[from] anyhow::Error),
    /// A stage name, argument or file name contains a NUL byte.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] std::ffi::NulError),
    #[error("fork failed: {0}")]
    Fork(nix::Error),
    #[error("wait failed: {0}")]
    Wait(nix::Error),
    /// The foreground pipeline finished with a non-zero status.
    #[error("exited with status {0}")]
    Failed(ExitCode),
}

impl ExecError {
    /// Exit code a non-interactive caller should report for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ExecError::Failed(code) => *code,
            _ => 1,
        }
    }
}

/// Anything that can go wrong with a single input line.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl Error {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Parse(_) => 2,
            Error::Exec(e) => e.exit_code(),
        }
    }
}
