/// Token identifiers, following the POSIX token recognition rules.
///
/// `Token` is an unclassified word-like lexeme; the parser later promotes it
/// to `Word`. `IoNumber` is a run of digits delimited by `<` or `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Token,
    AndIf,              // &&
    OrIf,               // ||
    DoubleSemicolon,    // ;;
    DoubleLessThan,     // <<
    DoubleGreat,        // >>
    LessAnd,            // <&
    GreatAnd,           // >&
    LessGreat,          // <>
    DoubleLessThanDash, // <<-
    Clobber,            // >|
    Semicolon,          // ;
    And,                // &
    Pipe,               // |
    OpenParen,          // (
    CloseParen,         // )
    Great,              // >
    Less,               // <
    Newline,
    IoNumber,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    pub fn eof() -> Self {
        Token {
            kind: TokenKind::Eof,
            value: String::new(),
        }
    }

    pub fn newline() -> Self {
        Token {
            kind: TokenKind::Newline,
            value: "\n".to_string(),
        }
    }
}

/// The authoritative mapping from lexeme to operator kind.
///
/// https://pubs.opengroup.org/onlinepubs/9699919799/utilities/V3_chap02.html#tag_18_10_02
pub fn operator_type_from(text: &str) -> Option<TokenKind> {
    match text {
        "&&" => Some(TokenKind::AndIf),
        "||" => Some(TokenKind::OrIf),
        ";;" => Some(TokenKind::DoubleSemicolon),
        "<<" => Some(TokenKind::DoubleLessThan),
        ">>" => Some(TokenKind::DoubleGreat),
        "<&" => Some(TokenKind::LessAnd),
        ">&" => Some(TokenKind::GreatAnd),
        "<>" => Some(TokenKind::LessGreat),
        "<<-" => Some(TokenKind::DoubleLessThanDash),
        ">|" => Some(TokenKind::Clobber),
        ";" => Some(TokenKind::Semicolon),
        "&" => Some(TokenKind::And),
        "|" => Some(TokenKind::Pipe),
        "(" => Some(TokenKind::OpenParen),
        ")" => Some(TokenKind::CloseParen),
        ">" => Some(TokenKind::Great),
        "<" => Some(TokenKind::Less),
        "\n" => Some(TokenKind::Newline),
        _ => None,
    }
}

/// Whether `buffer` extended with `ch` still forms an operator.
pub fn is_part_of_operator(buffer: &str, ch: char) -> bool {
    let mut text = String::with_capacity(buffer.len() + 1);
    text.push_str(buffer);
    text.push(ch);
    operator_type_from(&text).is_some()
}
