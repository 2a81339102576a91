use nix::fcntl::OFlag;

use crate::value::{
    AndOrListValue, CommandValue, PathData, RedirAction, RedirectionValue, Value, WithOp,
};

/// Nodes of the command tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Terminal sentinel; the runner reports it instead of evaluating.
    SyntaxError { message: String },
    Execute {
        argv: Vec<String>,
    },
    PathRedirection {
        path: String,
        fd: i32,
        flags: RedirFlag,
    },
    DupRedirection {
        left_fd: i32,
        right_fd: Option<i32>,
        direction: DupDirection,
    },
    Pipeline {
        left: Box<Node>,
        right: Box<Node>,
    },
    AndOrIf {
        left: Box<Node>,
        right: Box<Node>,
        kind: AndOrKind,
    },
    /// Aggregates the pieces of one simple command: its redirections and its
    /// `Execute` node, in source order.
    ConcatenateListToCommand { nodes: Vec<Node> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirFlag {
    Read,
    ReadWrite,
    Write,
    WriteAppend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOrKind {
    AndIf,
    OrIf,
}

impl Node {
    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Node::SyntaxError { .. })
    }

    /// Lowers the tree into runnable values. Only `SyntaxError` has no
    /// value; the runner reports that case before ever calling `eval`.
    pub fn eval(&self) -> Option<Value> {
        match self {
            Node::SyntaxError { .. } => None,
            Node::Execute { argv } => Some(Value::Command(CommandValue::with_argv(argv.clone()))),
            Node::PathRedirection { path, fd, flags } => {
                let open_flags = match flags {
                    RedirFlag::Read => OFlag::O_RDONLY,
                    RedirFlag::ReadWrite => OFlag::O_CREAT | OFlag::O_RDWR,
                    RedirFlag::Write => OFlag::O_CREAT | OFlag::O_WRONLY | OFlag::O_TRUNC,
                    RedirFlag::WriteAppend => OFlag::O_CREAT | OFlag::O_WRONLY | OFlag::O_APPEND,
                };
                Some(Value::Redirection(RedirectionValue {
                    io_number: *fd,
                    action: RedirAction::Open(PathData {
                        path: path.clone(),
                        flags: open_flags,
                    }),
                }))
            }
            Node::DupRedirection {
                left_fd,
                right_fd,
                direction,
            } => {
                let action = match (right_fd, direction) {
                    (None, _) => RedirAction::Close,
                    (Some(source), DupDirection::Input) => RedirAction::InputDup { source: *source },
                    (Some(source), DupDirection::Output) => {
                        RedirAction::OutputDup { source: *source }
                    }
                };
                Some(Value::Redirection(RedirectionValue {
                    io_number: *left_fd,
                    action,
                }))
            }
            Node::ConcatenateListToCommand { nodes } => {
                let mut command = CommandValue::default();
                for node in nodes {
                    match node.eval()? {
                        Value::Command(other) => command.argv = other.argv,
                        Value::Redirection(redirection) => command.redirections.push(redirection),
                        Value::AndOrList(_) => return None,
                    }
                }
                Some(Value::Command(command))
            }
            Node::Pipeline { left, right } => {
                let Value::Command(mut command) = left.eval()? else {
                    return None;
                };
                let Value::Command(next) = right.eval()? else {
                    return None;
                };
                command.next_in_pipeline = Some(Box::new(next));
                Some(Value::Command(command))
            }
            Node::AndOrIf { left, right, kind } => {
                let Value::Command(mut command) = left.eval()? else {
                    return None;
                };
                command.with_op = match kind {
                    AndOrKind::AndIf => WithOp::AndIf,
                    AndOrKind::OrIf => WithOp::OrIf,
                };

                let mut commands = vec![command];
                match right.eval()? {
                    Value::Command(next) => commands.push(next),
                    // A nested list on the right flattens into this one.
                    Value::AndOrList(list) => commands.extend(list.commands),
                    Value::Redirection(_) => return None,
                }
                Some(Value::AndOrList(AndOrListValue { commands }))
            }
        }
    }
}
