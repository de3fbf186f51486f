//! Compiles a small PEG grammar dialect into the Rust source of the
//! recursive-descent recognizer it describes.
//!
//! The pipeline is a straight line: [`scanner`] tokenizes grammar
//! source, [`parser`] turns tokens into an [`ast::Grammar`],
//! [`checker`] runs semantic passes over it (duplicate rules, dangling
//! references), and [`codegen`] walks the checked tree into literal
//! Rust text implementing a `Parser` with one `rule_<name>` function
//! per grammar rule.

pub mod ast;
pub mod checker;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod position;
pub mod scanner;
pub mod token;

use log::info;

use ast::Grammar;
use codegen::Codegen;
use error::PegError;

/// Runs the full pipeline over grammar source text and returns the
/// generated Rust source, or the first fatal error encountered.
///
/// Stops after checking if `check_only` is set, returning the empty
/// string on success (there is nothing further to generate) — used by
/// the CLI's `--check` flag.
pub fn compile(src: &str, check_only: bool) -> Result<String, PegError> {
    let grammar = parse_grammar(src)?;
    check_grammar(&grammar)?;
    info!("checked grammar with {} rule(s)", grammar.rules.len());

    if check_only {
        return Ok(String::new());
    }

    Codegen::new()
        .generate(&grammar)
        .map_err(PegError::from)
}

/// Scans and parses grammar source into an AST, without running the
/// checker. Exposed separately so the CLI can pretty-print the tree
/// (`--print-tree`) before deciding whether to check or generate.
pub fn parse_grammar(src: &str) -> Result<Grammar, PegError> {
    let mut p = parser::Parser::from_source(src)?;
    p.parse().map_err(PegError::from)
}

/// Runs the checker and turns any collected errors into a single
/// [`PegError::Check`].
pub fn check_grammar(grammar: &Grammar) -> Result<(), PegError> {
    let errors = checker::check(grammar);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PegError::Check(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_small_grammar_end_to_end() {
        let out = compile(r#"A = "a"+"#, false).unwrap();
        assert!(out.contains("fn rule_A"));
        assert!(out.contains("Parser::one_or_more"));
    }

    #[test]
    fn check_only_skips_codegen() {
        let out = compile(r#"A = "a""#, true).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn duplicate_rule_aborts_before_codegen() {
        let err = compile("A = \"a\"\nA = \"b\"", false).unwrap_err();
        assert!(matches!(err, PegError::Check(_)));
    }

    #[test]
    fn undefined_reference_aborts_before_codegen() {
        let err = compile(r#"A = B"#, false).unwrap_err();
        assert!(matches!(err, PegError::Check(_)));
    }

    #[test]
    fn malformed_grammar_reports_a_syntax_error() {
        let err = compile("A =", false).unwrap_err();
        assert!(matches!(err, PegError::Syntax(_)));
    }
}
