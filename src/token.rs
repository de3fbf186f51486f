use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use crate::position::Position;

/// The tag of a scanned [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Eof,

    Ident,
    String,
    Range,
    Code,
    Dot,

    Assign,
    Colon,

    LParen,
    RParen,

    Question,
    Plus,
    Star,

    And,
    Not,

    Slash,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenType::Eof => "EOF",
            TokenType::Ident => "IDENT",
            TokenType::String => "STRING",
            TokenType::Range => "RANGE",
            TokenType::Code => "CODE",
            TokenType::Dot => "DOT",
            TokenType::Assign => "ASSIGN",
            TokenType::Colon => "COLON",
            TokenType::LParen => "LPAREN",
            TokenType::RParen => "RPAREN",
            TokenType::Question => "QUESTION",
            TokenType::Plus => "PLUS",
            TokenType::Star => "STAR",
            TokenType::And => "AND",
            TokenType::Not => "NOT",
            TokenType::Slash => "SLASH",
        };
        f.write_str(s)
    }
}

/// Reserved identifiers recognised by the scanner. The grammar dialect
/// currently has none of its own beyond the punctuation tokens, but a
/// future revision may reserve words like `package`/`import`; the
/// table is kept so adding one is a one-line change rather than a new
/// code path.
pub static RESERVED: Lazy<HashMap<&'static str, TokenType>> = Lazy::new(HashMap::new);

/// A single scanned token: its tag, the raw text it carries (only
/// meaningful for `Ident`/`String`/`Range`/`Code`), and the position of
/// its first codepoint. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub ty: TokenType,
    pub literal: String,
    pub pos: Position,
}

impl Token {
    pub fn new(ty: TokenType, literal: impl Into<String>, pos: Position) -> Self {
        Self {
            ty,
            literal: literal.into(),
            pos,
        }
    }

    pub fn eof(pos: Position) -> Self {
        Self::new(TokenType::Eof, "", pos)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.literal.is_empty() {
            write!(f, "{}", self.ty)
        } else {
            write!(f, "{}({:?})", self.ty, self.literal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_token_has_empty_literal() {
        let t = Token::eof(Position::start());
        assert_eq!(t.ty, TokenType::Eof);
        assert!(t.literal.is_empty());
    }

    #[test]
    fn display_includes_literal_when_present() {
        let t = Token::new(TokenType::Ident, "foo", Position::start());
        assert_eq!(format!("{}", t), "IDENT(\"foo\")");
    }
}
