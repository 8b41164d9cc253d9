//! A small interactive shell with pipelines, redirections and `&&` / `||` chains.
//!
//! A line is split on whitespace and folded into a [`Chain`] of
//! [`CommandGroup`]s by [`parse`]. The [`Interpreter`] runs each group as a
//! tree of OS processes connected by pipes, intercepts the `cd` and `exit`
//! builtins, and walks the chain with short-circuit semantics. [`JobControl`]
//! tracks the foreground job for the SIGINT and SIGCHLD handlers.
//!
//! There is no quoting, expansion, globbing or grouping: every token that is
//! not an operator is passed to the program verbatim.

pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod interpreter;
pub mod job;
mod parser;
pub mod pipeline;
pub mod plan;

pub use command::{Chain, Command, CommandGroup, Connector, ExitCode};
pub use config::ShellConfig;
pub use error::{Error, ExecError, ParseError};
pub use interpreter::{Interpreter, Outcome};
pub use job::JobControl;
pub use parser::parse;
