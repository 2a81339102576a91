use std::os::unix::io::RawFd;

use nix::fcntl::OFlag;

/// Evaluated form of a command tree, ready for the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Command(CommandValue),
    Redirection(RedirectionValue),
    AndOrList(AndOrListValue),
}

/// One simple command: its argument vector, its redirections in source
/// order, the next pipeline stage (if any), and the operator joining this
/// command to the following one in an AND/OR list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandValue {
    pub argv: Vec<String>,
    pub redirections: Vec<RedirectionValue>,
    pub next_in_pipeline: Option<Box<CommandValue>>,
    pub with_op: WithOp,
}

impl CommandValue {
    pub fn with_argv(argv: Vec<String>) -> Self {
        CommandValue {
            argv,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WithOp {
    #[default]
    None,
    AndIf,
    OrIf,
}

/// A single redirection to perform on `io_number` before a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionValue {
    pub io_number: RawFd,
    pub action: RedirAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirAction {
    /// Open `path` with the precomputed flags and bind it to `io_number`.
    Open(PathData),
    /// Close `io_number` (`<&-`, `>&-`).
    Close,
    /// Duplicate `source` onto `io_number` for reading (`<&n`).
    InputDup { source: RawFd },
    /// Duplicate `source` onto `io_number` for writing (`>&n`).
    OutputDup { source: RawFd },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathData {
    pub path: String,
    pub flags: OFlag,
}

/// A flat sequence of commands joined by `&&`/`||`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AndOrListValue {
    pub commands: Vec<CommandValue>,
}
