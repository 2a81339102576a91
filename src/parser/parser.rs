use crate::ast::{AndOrKind, DupDirection, Node, RedirFlag};
use crate::lexer::{Lexer, Token, TokenKind};

/// Batch-fed recursive descent over the lexer's token stream.
///
/// https://pubs.opengroup.org/onlinepubs/9699919799/utilities/V3_chap02.html#tag_18_10_02
pub struct Parser {
    lexer: Lexer,
    tokens: Vec<Token>,
    index: usize,
    eof: Token,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Parser {
            lexer: Lexer::new(input),
            tokens: Vec::new(),
            index: 0,
            eof: Token::eof(),
        }
    }

    /// Parses the whole input into a command tree. Malformed input comes
    /// back as a `SyntaxError` node, never as an absent result.
    pub fn parse(mut self) -> Node {
        self.fill_token_buffer();

        // Reserved words are not recognised; every unclassified token is
        // promoted to a word before descent.
        for token in &mut self.tokens {
            if token.kind == TokenKind::Token {
                token.kind = TokenKind::Word;
            }
        }

        self.parse_and_or_list()
    }

    fn fill_token_buffer(&mut self) {
        loop {
            let batch = self.lexer.batch_next();
            if batch.is_empty() {
                break;
            }
            self.tokens.extend(batch);
        }
    }

    fn is_eof(&self) -> bool {
        self.index >= self.tokens.len() || self.tokens[self.index].kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        if self.is_eof() {
            return &self.eof;
        }
        &self.tokens[self.index]
    }

    fn consume(&mut self) -> &Token {
        if self.is_eof() {
            return &self.eof;
        }
        let index = self.index;
        self.index += 1;
        &self.tokens[index]
    }

    fn parse_and_or_list(&mut self) -> Node {
        let left = self.parse_pipeline();
        if left.is_syntax_error() {
            return left;
        }

        let kind = match self.peek().kind {
            TokenKind::AndIf => AndOrKind::AndIf,
            TokenKind::OrIf => AndOrKind::OrIf,
            _ => return left,
        };
        self.consume();

        let right = self.parse_and_or_list();
        if right.is_syntax_error() {
            return right;
        }

        Node::AndOrIf {
            left: Box::new(left),
            right: Box::new(right),
            kind,
        }
    }

    fn parse_pipeline(&mut self) -> Node {
        let left = self.parse_simple_command();
        if left.is_syntax_error() {
            return left;
        }

        if self.peek().kind != TokenKind::Pipe {
            return left;
        }
        self.consume();

        let right = self.parse_pipeline();
        if right.is_syntax_error() {
            return right;
        }

        Node::Pipeline {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_simple_command(&mut self) -> Node {
        let mut argv = Vec::new();
        let mut nodes = Vec::new();

        match self.peek().kind {
            TokenKind::Word => argv.push(self.consume().value.clone()),
            TokenKind::Eof | TokenKind::Newline => {
                // A blank line still yields a command, just one with no
                // words.
                nodes.push(Node::Execute { argv });
                return Node::ConcatenateListToCommand { nodes };
            }
            _ => {
                return Node::SyntaxError {
                    message: "prefixed redirection not supported yet".to_string(),
                };
            }
        }

        loop {
            if self.peek().kind == TokenKind::Word {
                argv.push(self.consume().value.clone());
                continue;
            }
            match self.parse_io_redirect() {
                Some(node) if node.is_syntax_error() => return node,
                Some(node) => nodes.push(node),
                None => break,
            }
        }

        nodes.push(Node::Execute { argv });
        Node::ConcatenateListToCommand { nodes }
    }

    fn parse_io_redirect(&mut self) -> Option<Node> {
        let mut io_number = None;
        if self.peek().kind == TokenKind::IoNumber {
            io_number = self.consume().value.parse::<i32>().ok();
        }
        self.parse_io_file(io_number)
    }

    fn parse_io_file(&mut self, io_number: Option<i32>) -> Option<Node> {
        let op = match self.peek().kind {
            TokenKind::Less
            | TokenKind::LessAnd
            | TokenKind::Great
            | TokenKind::GreatAnd
            | TokenKind::DoubleGreat
            | TokenKind::LessGreat
            | TokenKind::Clobber => self.consume().kind,
            _ => return None,
        };

        if self.peek().kind != TokenKind::Word {
            return Some(Node::SyntaxError {
                message: "no file name given for redirection".to_string(),
            });
        }
        let word = self.consume().value.clone();

        let node = match op {
            TokenKind::Less => Node::PathRedirection {
                path: word,
                fd: io_number.unwrap_or(0),
                flags: RedirFlag::Read,
            },
            TokenKind::Great => Node::PathRedirection {
                path: word,
                fd: io_number.unwrap_or(1),
                flags: RedirFlag::Write,
            },
            TokenKind::DoubleGreat => Node::PathRedirection {
                path: word,
                fd: io_number.unwrap_or(1),
                flags: RedirFlag::WriteAppend,
            },
            TokenKind::LessGreat => Node::PathRedirection {
                path: word,
                fd: io_number.unwrap_or(0),
                flags: RedirFlag::ReadWrite,
            },
            // ">|" would override noclobber, which this shell does not
            // implement, so it opens exactly like ">".
            TokenKind::Clobber => Node::PathRedirection {
                path: word,
                fd: io_number.unwrap_or(1),
                flags: RedirFlag::Write,
            },
            TokenKind::GreatAnd | TokenKind::LessAnd => {
                let (default_fd, direction) = if op == TokenKind::LessAnd {
                    (0, DupDirection::Input)
                } else {
                    (1, DupDirection::Output)
                };

                let right_fd = if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit()) {
                    match word.parse::<i32>() {
                        Ok(fd) => Some(fd),
                        Err(_) => {
                            return Some(Node::SyntaxError {
                                message: "dup operator not given a valid word".to_string(),
                            })
                        }
                    }
                } else if word == "-" {
                    None
                } else {
                    return Some(Node::SyntaxError {
                        message: "dup operator not given a valid word".to_string(),
                    });
                };

                Node::DupRedirection {
                    left_fd: io_number.unwrap_or(default_fd),
                    right_fd,
                    direction,
                }
            }
            // The guard above admits only redirection operators.
            _ => return None,
        };

        Some(node)
    }
}
