use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// A single pipeline stage: program name plus its literal arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Program to run, looked up through `PATH` by the OS when it has no `/`.
    pub name: String,
    /// Arguments passed as-is, without quote stripping or expansion.
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Logical operator linking a command group to the next one in a [`Chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `&&`: run the next group only if this one succeeded.
    And,
    /// `||`: run the next group only if this one failed.
    Or,
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Connector::And => "&&",
            Connector::Or => "||",
        })
    }
}

/// One `|`-joined pipeline together with its redirections.
///
/// Stages are stored in shell order: `commands[0]` is the head (the first
/// program, reading the group's stdin) and the last element is the tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandGroup {
    pub commands: Vec<Command>,
    /// File attached to the head stage's standard input (`<`).
    pub stdin: Option<String>,
    /// File attached to the tail stage's standard output (`>`).
    pub stdout: Option<String>,
    /// File attached to the tail stage's standard error (`2>`).
    pub stderr: Option<String>,
    /// Set by a trailing `&`.
    pub background: bool,
    /// Operator linking this group to the next one, `None` for the last group.
    pub connector: Option<Connector>,
}

impl CommandGroup {
    /// First stage in shell order.
    pub fn head(&self) -> Option<&Command> {
        self.commands.first()
    }

    /// Last stage in shell order; builtins are matched against it.
    pub fn tail(&self) -> Option<&Command> {
        self.commands.last()
    }
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{command}")?;
        }
        if let Some(path) = &self.stdin {
            write!(f, " < {path}")?;
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {path}")?;
        }
        if let Some(path) = &self.stderr {
            write!(f, " 2> {path}")?;
        }
        if self.background {
            f.write_str(" &")?;
        }
        if let Some(connector) = self.connector {
            write!(f, " {connector}")?;
        }
        Ok(())
    }
}

/// Every command group parsed from one input line, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    groups: Vec<CommandGroup>,
}

impl Chain {
    pub fn new(groups: Vec<CommandGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[CommandGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{group}")?;
        }
        Ok(())
    }
}
