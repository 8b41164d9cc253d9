use crate::command::{Chain, Command, CommandGroup, Connector};
use crate::error::ParseError;
use std::str::SplitWhitespace;

/// Operator tokens recognised on the command line.
///
/// The grammar is flat: anything not in [`OPERATORS`] is a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// `|`: close the current stage and start the next one.
    Pipe,
    /// `<`: the next token names the group's stdin file.
    RedirectIn,
    /// `>`: the next token names the group's stdout file.
    RedirectOut,
    /// `2>`: the next token names the group's stderr file.
    RedirectErr,
    /// `&`: run the group in the background.
    Background,
    /// `&&` / `||`: close the group and link it to the next one.
    Connect(Connector),
}

const OPERATORS: &[(&str, Operator)] = &[
    ("|", Operator::Pipe),
    ("<", Operator::RedirectIn),
    (">", Operator::RedirectOut),
    ("2>", Operator::RedirectErr),
    ("&", Operator::Background),
    ("&&", Operator::Connect(Connector::And)),
    ("||", Operator::Connect(Connector::Or)),
];

impl Operator {
    fn lookup(token: &str) -> Option<(&'static str, Operator)> {
        OPERATORS.iter().copied().find(|(t, _)| *t == token)
    }
}

/// Folds whitespace-separated tokens into a [`Chain`].
struct ChainBuilder<'a> {
    tokens: SplitWhitespace<'a>,
    command: Command,
    group: CommandGroup,
    groups: Vec<CommandGroup>,
    /// Pipe or connector still waiting for the command that follows it.
    pending: Option<&'static str>,
}

impl<'a> ChainBuilder<'a> {
    fn from(line: &'a str) -> Self {
        ChainBuilder {
            tokens: line.split_whitespace(),
            command: Command::default(),
            group: CommandGroup::default(),
            groups: Vec::new(),
            pending: None,
        }
    }

    fn build_chain(mut self) -> Result<Chain, ParseError> {
        while let Some(token) = self.tokens.next() {
            match Operator::lookup(token) {
                Some((op_token, op)) => self.apply(op_token, op)?,
                None => self.push_word(token),
            }
        }

        if !self.command.is_empty() {
            self.finish_command();
        } else if let Some(op) = self.pending {
            return Err(ParseError::DanglingOperator(op));
        }
        if !self.group.commands.is_empty() {
            self.groups.push(self.group);
        }
        Ok(Chain::new(self.groups))
    }

    fn push_word(&mut self, word: &str) {
        if self.command.name.is_empty() {
            self.command.name = word.to_string();
        } else {
            self.command.args.push(word.to_string());
        }
        self.pending = None;
    }

    fn apply(&mut self, token: &'static str, op: Operator) -> Result<(), ParseError> {
        if self.command.is_empty() {
            return Err(ParseError::MissingCommand(token));
        }
        match op {
            Operator::Pipe => {
                self.finish_command();
                self.pending = Some(token);
            }
            Operator::RedirectIn => self.group.stdin = Some(self.target(token)?),
            Operator::RedirectOut => self.group.stdout = Some(self.target(token)?),
            Operator::RedirectErr => self.group.stderr = Some(self.target(token)?),
            Operator::Background => self.group.background = true,
            Operator::Connect(connector) => {
                self.finish_command();
                self.group.connector = Some(connector);
                self.groups.push(std::mem::take(&mut self.group));
                self.pending = Some(token);
            }
        }
        Ok(())
    }

    /// Consume the file name following a redirection operator.
    fn target(&mut self, token: &'static str) -> Result<String, ParseError> {
        self.tokens
            .next()
            .map(str::to_string)
            .ok_or(ParseError::MissingTarget(token))
    }

    fn finish_command(&mut self) {
        self.group.commands.push(std::mem::take(&mut self.command));
    }
}

/// Parse one input line into a chain of command groups.
///
/// This is pure text processing: no files are opened and nothing is spawned.
/// A blank line yields an empty chain.
pub fn parse(line: &str) -> Result<Chain, ParseError> {
    let chain = ChainBuilder::from(line).build_chain()?;
    log::debug!("parsed {:?} into {} group(s)", line, chain.len());
    Ok(chain)
}
