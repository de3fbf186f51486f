use thiserror::Error;

use crate::position::Position;
use crate::token::TokenType;

/// Errors raised while tokenising the grammar source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("{pos}: invalid character {ch:?}")]
    InvalidChar { ch: char, pos: Position },

    #[error("{pos}: unclosed string literal")]
    UnclosedString { pos: Position },

    #[error("{pos}: unclosed character class")]
    UnclosedRange { pos: Position },

    #[error("{pos}: unclosed code block")]
    UnclosedCode { pos: Position },
}

impl ScanError {
    pub fn pos(&self) -> Position {
        match self {
            ScanError::InvalidChar { pos, .. }
            | ScanError::UnclosedString { pos }
            | ScanError::UnclosedRange { pos }
            | ScanError::UnclosedCode { pos } => *pos,
        }
    }
}

/// A fatal grammar-parser error: the top-level `grammar` production
/// failed to consume the whole token stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{pos}: {context}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub pos: Position,
    /// Name of the production that was active when parsing failed,
    /// e.g. `"rule"`, `"primaryExpr"` — gives the message a trace of
    /// the parse context, not just a token mismatch.
    pub context: &'static str,
    pub expected: String,
    pub found: TokenType,
}

/// A semantic error from the checker. Errors of this kind are
/// collected, never raised singly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("Duplicate rule {0:?}")]
    DuplicateRule(String),
    #[error("Rule {0:?} undefined")]
    UndefinedRule(String),
}

/// A codegen-time invariant violation: these indicate a bug in the
/// generator itself (a malformed AST should never reach it), not a
/// problem with the user's grammar.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("internal error: malformed AST: {0}")]
pub struct CodegenError(pub String);

/// Top-level error type unifying every stage, for `main.rs`'s single
/// `Result` plumbing.
#[derive(Debug, Error)]
pub enum PegError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Check(Vec<CheckError>),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}
