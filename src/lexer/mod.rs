mod lexer;
mod token;

pub use lexer::{Lexer, StateType};
pub use token::{is_part_of_operator, operator_type_from, Token, TokenKind};
