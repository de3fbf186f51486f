use log::trace;

use crate::error::ScanError;
use crate::position::Position;
use crate::token::{Token, TokenType, RESERVED};

/// Tokenises a grammar source held entirely in memory as decoded
/// codepoints, rather than streamed, for simplicity.
pub struct Scanner {
    chars: Vec<char>,
    n: usize,
    pos: Position,
}

impl Scanner {
    pub fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            n: 0,
            pos: Position::start(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.n).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.n + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.n += 1;
        if c == '\n' || c == '\r' {
            self.pos.newline();
        } else {
            self.pos.advance();
        }
        Some(c)
    }

    fn skip_space_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\n') | Some('\r') => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Produce the next token, or `EOF` once input is exhausted.
    pub fn scan(&mut self) -> Result<Token, ScanError> {
        self.skip_space_and_comments();

        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token::eof(start));
        };

        let token = if is_ident_first(c) {
            self.scan_ident(start)
        } else if c == '"' {
            self.scan_string(start)?
        } else if c == '[' {
            self.scan_range(start)?
        } else if c == '{' {
            self.scan_code(start)?
        } else if let Some(ty) = punctuation(c) {
            self.bump();
            Token::new(ty, "", start)
        } else {
            return Err(ScanError::InvalidChar { ch: c, pos: start });
        };

        trace!("scan: {} at {}", token, start);
        Ok(token)
    }

    fn scan_ident(&mut self, start: Position) -> Token {
        let mut literal = String::new();
        literal.push(self.bump().expect("caller checked is_ident_first"));
        while let Some(c) = self.peek() {
            if is_ident_cont(c) {
                literal.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match RESERVED.get(literal.as_str()) {
            Some(ty) => Token::new(*ty, literal, start),
            None => Token::new(TokenType::Ident, literal, start),
        }
    }

    fn scan_string(&mut self, start: Position) -> Result<Token, ScanError> {
        self.bump(); // opening quote
        let mut literal = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::new(TokenType::String, literal, start)),
                Some('\\') => match self.bump() {
                    Some(c) => literal.push(escape(c)),
                    None => return Err(ScanError::UnclosedString { pos: start }),
                },
                Some(c) => literal.push(c),
                None => return Err(ScanError::UnclosedString { pos: start }),
            }
        }
    }

    /// Consumes `[...]`, including the brackets in the returned
    /// literal — downstream `CharRange` parsing strips them.
    fn scan_range(&mut self, start: Position) -> Result<Token, ScanError> {
        let mut literal = String::new();
        literal.push(self.bump().expect("caller checked '['"));
        loop {
            match self.bump() {
                Some(']') => {
                    literal.push(']');
                    return Ok(Token::new(TokenType::Range, literal, start));
                }
                Some('\\') => match self.bump() {
                    Some(c) => literal.push(escape(c)),
                    None => return Err(ScanError::UnclosedRange { pos: start }),
                },
                Some(c) => literal.push(c),
                None => return Err(ScanError::UnclosedRange { pos: start }),
            }
        }
    }

    /// Consumes a balanced `{...}` code block; a `}` preceded by `\`
    /// does not close it. The literal is the content without the
    /// outermost braces.
    fn scan_code(&mut self, start: Position) -> Result<Token, ScanError> {
        self.bump(); // opening brace
        let mut literal = String::new();
        let mut depth = 0usize;
        loop {
            match self.bump() {
                Some('}') if depth == 0 => return Ok(Token::new(TokenType::Code, literal, start)),
                Some('}') => {
                    depth -= 1;
                    literal.push('}');
                }
                Some('{') => {
                    depth += 1;
                    literal.push('{');
                }
                Some('\\') => {
                    // A `\}` is an escape that keeps the brace from
                    // closing; record both characters verbatim so the
                    // action code text round-trips.
                    literal.push('\\');
                    match self.bump() {
                        Some(c) => literal.push(c),
                        None => return Err(ScanError::UnclosedCode { pos: start }),
                    }
                }
                Some(c) => literal.push(c),
                None => return Err(ScanError::UnclosedCode { pos: start }),
            }
        }
    }

    /// All remaining tokens, terminated by (and including) `EOF`.
    pub fn scan_all(&mut self) -> Result<Vec<Token>, ScanError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.scan()?;
            let is_eof = tok.ty == TokenType::Eof;
            tokens.push(tok);
            if is_eof {
                return Ok(tokens);
            }
        }
    }
}

fn is_ident_first(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_cont(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn punctuation(c: char) -> Option<TokenType> {
    Some(match c {
        '.' => TokenType::Dot,
        '=' => TokenType::Assign,
        ':' => TokenType::Colon,
        '(' => TokenType::LParen,
        ')' => TokenType::RParen,
        '?' => TokenType::Question,
        '+' => TokenType::Plus,
        '*' => TokenType::Star,
        '&' => TokenType::And,
        '!' => TokenType::Not,
        '/' => TokenType::Slash,
        _ => return None,
    })
}

fn escape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        other => other,
    }
}
