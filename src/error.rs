use std::fmt;

/// Kinds of user-facing shell diagnostics. The display form is the prefix
/// written before the message on the error stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    General,
    SyntaxError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::General => write!(f, "ratsh (error)"),
            ErrorKind::SyntaxError => write!(f, "ratsh (syntax error)"),
        }
    }
}
