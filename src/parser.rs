use log::trace;

use crate::ast::{
    ActionExpr, ChoiceExpr, Grammar, LabeledExpr, Matcher, PrefixOp, PrefixedExpr, PrimaryExpr,
    Rule, SeqExpr, SuffixOp, SuffixedExpr,
};
use crate::ast::{CharRange, CharSpan};
use crate::error::SyntaxError;
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};

/// A recursive-descent parser over a pre-scanned token stream.
///
/// Every production below returns `Option<T>`: `None` means "this
/// alternative doesn't match here", which the caller backtracks from
/// without it being an error. Only the top-level [`Parser::parse`]
/// turns a failure into a [`SyntaxError`], using the furthest failure
/// observed by [`Parser::expect`] as the diagnostic — this gives a
/// more useful message than reporting wherever the outermost
/// production happened to give up.
pub struct Parser {
    tokens: Vec<Token>,
    n: usize,
    furthest: Option<SyntaxError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            n: 0,
            furthest: None,
        }
    }

    pub fn from_source(src: &str) -> Result<Self, crate::error::ScanError> {
        let tokens = Scanner::new(src).scan_all()?;
        Ok(Self::new(tokens))
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.n]
    }

    fn mark(&self) -> usize {
        self.n
    }

    fn reset(&mut self, mark: usize) {
        self.n = mark;
    }

    /// Runs `f` with backtracking: if it returns `None`, the cursor is
    /// restored to where it was before `f` ran. This is the one place
    /// that knows about save/restore; every production composes with
    /// it instead of managing its own position bookkeeping.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let mark = self.mark();
        let result = f(self);
        if result.is_none() {
            self.reset(mark);
        }
        result
    }

    /// Consumes the current token if it has type `ty`, recording a
    /// furthest-failure diagnostic otherwise. `context` names the
    /// production doing the expecting, for the eventual error message.
    fn expect(&mut self, ty: TokenType, context: &'static str) -> Option<Token> {
        if self.peek().ty == ty {
            let tok = self.tokens[self.n].clone();
            self.n += 1;
            Some(tok)
        } else {
            self.record_failure(context, ty.to_string());
            None
        }
    }

    fn record_failure(&mut self, context: &'static str, expected: String) {
        let found = self.peek();
        let candidate = SyntaxError {
            pos: found.pos,
            context,
            expected,
            found: found.ty,
        };
        let replace = match &self.furthest {
            Some(prev) => candidate.pos >= prev.pos,
            None => true,
        };
        if replace {
            self.furthest = Some(candidate);
        }
    }

    /// Parses the whole token stream as a `grammar` production. Fails
    /// with the furthest [`SyntaxError`] seen if the grammar doesn't
    /// consume every token up to `EOF`.
    pub fn parse(&mut self) -> Result<Grammar, SyntaxError> {
        match self.grammar() {
            Some(g) => Ok(g),
            None => Err(self
                .furthest
                .clone()
                .unwrap_or_else(|| SyntaxError {
                    pos: self.peek().pos,
                    context: "grammar",
                    expected: "rule".to_string(),
                    found: self.peek().ty,
                })),
        }
    }

    fn grammar(&mut self) -> Option<Grammar> {
        self.attempt(|p| {
            let code = p.code();
            let rules = p.rule_list()?;
            p.expect(TokenType::Eof, "grammar")?;
            Some(Grammar { code, rules })
        })
    }

    fn rule_list(&mut self) -> Option<Vec<Rule>> {
        let first = self.rule()?;
        let mut rules = vec![first];
        while let Some(rule) = self.rule() {
            rules.push(rule);
        }
        Some(rules)
    }

    fn rule(&mut self) -> Option<Rule> {
        self.attempt(|p| {
            let name = p.ident()?;
            p.expect(TokenType::Assign, "rule")?;
            let choice = p.choice_expr()?;
            Some(Rule { name, choice })
        })
    }

    fn choice_expr(&mut self) -> Option<ChoiceExpr> {
        self.attempt(|p| {
            let first = p.action_expr()?;
            let mut alternatives = vec![first];
            loop {
                let mark = p.mark();
                if p.expect(TokenType::Slash, "choiceExpr").is_none() {
                    break;
                }
                match p.action_expr() {
                    Some(a) => alternatives.push(a),
                    None => {
                        p.reset(mark);
                        break;
                    }
                }
            }
            Some(ChoiceExpr { alternatives })
        })
    }

    fn action_expr(&mut self) -> Option<ActionExpr> {
        self.attempt(|p| {
            let seq = p.seq_expr()?;
            let code = p.code();
            Some(ActionExpr { seq, code })
        })
    }

    fn seq_expr(&mut self) -> Option<SeqExpr> {
        let first = self.labeled_expr()?;
        let mut parts = vec![first];
        while let Some(part) = self.labeled_expr() {
            parts.push(part);
        }
        Some(SeqExpr { parts })
    }

    fn labeled_expr(&mut self) -> Option<LabeledExpr> {
        self.attempt(|p| {
            let label = p.label();
            let expr = p.prefixed_expr()?;
            Some(LabeledExpr { label, expr })
        })
    }

    /// `ident ":"`, tried as a unit so a bare rule reference (no
    /// colon) is never mistaken for a label.
    fn label(&mut self) -> Option<String> {
        self.attempt(|p| {
            let name = p.ident()?;
            p.expect(TokenType::Colon, "label")?;
            Some(name)
        })
    }

    fn prefixed_expr(&mut self) -> Option<PrefixedExpr> {
        self.attempt(|p| {
            let op = p.prefix_op();
            let expr = p.suffixed_expr()?;
            Some(PrefixedExpr { op, expr })
        })
    }

    fn prefix_op(&mut self) -> Option<PrefixOp> {
        let mark = self.mark();
        if self.expect(TokenType::And, "prefixOp").is_some() {
            return Some(PrefixOp::And);
        }
        self.reset(mark);
        if self.expect(TokenType::Not, "prefixOp").is_some() {
            return Some(PrefixOp::Not);
        }
        self.reset(mark);
        None
    }

    fn suffixed_expr(&mut self) -> Option<SuffixedExpr> {
        self.attempt(|p| {
            let primary = p.primary_expr()?;
            let op = p.suffix_op();
            Some(SuffixedExpr { primary, op })
        })
    }

    fn suffix_op(&mut self) -> Option<SuffixOp> {
        let mark = self.mark();
        if self.expect(TokenType::Question, "suffixOp").is_some() {
            return Some(SuffixOp::Question);
        }
        self.reset(mark);
        if self.expect(TokenType::Plus, "suffixOp").is_some() {
            return Some(SuffixOp::Plus);
        }
        self.reset(mark);
        if self.expect(TokenType::Star, "suffixOp").is_some() {
            return Some(SuffixOp::Star);
        }
        self.reset(mark);
        None
    }

    fn primary_expr(&mut self) -> Option<PrimaryExpr> {
        if let Some(tok) = self.expect(TokenType::String, "primaryExpr") {
            return Some(PrimaryExpr::Matcher(Matcher::Literal(tok.literal)));
        }
        let mark = self.mark();
        if let Some(tok) = self.expect(TokenType::Range, "primaryExpr") {
            return Some(PrimaryExpr::Matcher(Matcher::CharRange(parse_char_range(
                &tok.literal,
            ))));
        }
        self.reset(mark);
        if self.expect(TokenType::Dot, "primaryExpr").is_some() {
            return Some(PrimaryExpr::Matcher(Matcher::AnyChar));
        }
        self.reset(mark);
        if let Some(name) = self.rule_ref() {
            return Some(PrimaryExpr::RuleRef(name));
        }
        if let Some(choice) = self.sub_choice_expr() {
            return Some(PrimaryExpr::SubExpr(Box::new(choice)));
        }
        self.record_failure("primaryExpr", "string, range, '.', rule reference or '('".into());
        None
    }

    /// `ident`, accepted only when *not* followed by `=` — that shape
    /// belongs to `rule`, not a reference to one.
    fn rule_ref(&mut self) -> Option<String> {
        self.attempt(|p| {
            let name = p.ident()?;
            if p.peek().ty == TokenType::Assign {
                None
            } else {
                Some(name)
            }
        })
    }

    fn sub_choice_expr(&mut self) -> Option<ChoiceExpr> {
        self.attempt(|p| {
            p.expect(TokenType::LParen, "subChoiceExpr")?;
            let choice = p.choice_expr()?;
            p.expect(TokenType::RParen, "subChoiceExpr")?;
            Some(choice)
        })
    }

    fn ident(&mut self) -> Option<String> {
        self.expect(TokenType::Ident, "ident").map(|t| t.literal)
    }

    fn code(&mut self) -> Option<String> {
        self.expect(TokenType::Code, "code").map(|t| t.literal)
    }
}

/// Decodes a scanned `[...]` literal (brackets included) into a
/// [`CharRange`]: an optional leading `^` negates the class, then
/// `a-z` pairs and bare characters are read left to right.
fn parse_char_range(literal: &str) -> CharRange {
    let inner: Vec<char> = literal.chars().collect();
    let inner = &inner[1..inner.len() - 1];

    let (not, inner) = match inner.first() {
        Some('^') => (true, &inner[1..]),
        _ => (false, inner),
    };

    let mut ranges = Vec::new();
    let mut i = 0;
    while i < inner.len() {
        if i + 2 < inner.len() && inner[i + 1] == '-' {
            ranges.push(CharSpan {
                start: inner[i],
                end: inner[i + 2],
            });
            i += 3;
        } else {
            ranges.push(CharSpan::single(inner[i]));
            i += 1;
        }
    }

    trace!("parsed char range: not={} ranges={}", not, ranges.len());
    CharRange { not, ranges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Grammar {
        Parser::from_source(src).unwrap().parse().unwrap()
    }

    #[test]
    fn smallest_grammar_parses() {
        let g = parse(r#"A = "a""#);
        assert_eq!(g.rules.len(), 1);
        assert_eq!(g.start_rule(), "A");
        assert_eq!(g.rules[0].choice.alternatives.len(), 1);
    }

    #[test]
    fn ordered_choice_keeps_alternatives_in_order() {
        let g = parse(r#"A = "a" / "b" / "c""#);
        let alts = &g.rules[0].choice.alternatives;
        assert_eq!(alts.len(), 3);
    }

    #[test]
    fn sequence_collects_every_labeled_part() {
        let g = parse(r#"A = x:"a" y:"b""#);
        let parts = &g.rules[0].choice.alternatives[0].seq.parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].label.as_deref(), Some("x"));
        assert_eq!(parts[1].label.as_deref(), Some("y"));
    }

    #[test]
    fn rule_reference_is_not_confused_with_a_new_rule() {
        let g = parse("A = B\nB = \"b\"");
        let part = &g.rules[0].choice.alternatives[0].seq.parts[0];
        assert!(matches!(part.expr.expr.primary, PrimaryExpr::RuleRef(ref n) if n == "B"));
    }

    #[test]
    fn prefix_and_suffix_operators_attach() {
        let g = parse(r#"A = &"a"? !"b"+ "c"*"#);
        let parts = &g.rules[0].choice.alternatives[0].seq.parts;
        assert_eq!(parts[0].expr.op, Some(PrefixOp::And));
        assert_eq!(parts[0].expr.expr.op, Some(SuffixOp::Question));
        assert_eq!(parts[1].expr.op, Some(PrefixOp::Not));
        assert_eq!(parts[1].expr.expr.op, Some(SuffixOp::Plus));
        assert_eq!(parts[2].expr.op, None);
        assert_eq!(parts[2].expr.expr.op, Some(SuffixOp::Star));
    }

    #[test]
    fn parenthesised_sub_choice_nests() {
        let g = parse(r#"A = ("a" / "b") "c""#);
        let first = &g.rules[0].choice.alternatives[0].seq.parts[0];
        assert!(matches!(first.expr.expr.primary, PrimaryExpr::SubExpr(_)));
    }

    #[test]
    fn char_range_decodes_negation_and_spans() {
        let g = parse(r#"A = [^a-z0-9]"#);
        let primary = &g.rules[0].choice.alternatives[0].seq.parts[0].expr.expr.primary;
        match primary {
            PrimaryExpr::Matcher(Matcher::CharRange(cr)) => {
                assert!(cr.not);
                assert_eq!(cr.ranges.len(), 2);
                assert!(cr.ranges[0].contains('m'));
                assert!(cr.ranges[1].contains('5'));
            }
            other => panic!("expected a char range, got {other:?}"),
        }
    }

    #[test]
    fn dot_matcher_is_kept_distinct() {
        let g = parse(r#"A = .{ 1 }"#);
        let primary = &g.rules[0].choice.alternatives[0].seq.parts[0].expr.expr.primary;
        assert!(matches!(primary, PrimaryExpr::Matcher(Matcher::AnyChar)));
    }

    #[test]
    fn action_code_attaches_to_its_action_expr() {
        let g = parse(r#"A = "a" { 1 }"#);
        assert_eq!(g.rules[0].choice.alternatives[0].code.as_deref(), Some(" 1 "));
    }

    #[test]
    fn prologue_code_is_optional() {
        let g = parse(r#"A = "a""#);
        assert!(g.code.is_none());

        let g = parse(r#"{ prologue }A = "a""#);
        assert_eq!(g.code.as_deref(), Some(" prologue "));
    }

    #[test]
    fn undefined_reference_is_still_a_syntax_success() {
        // The grammar parser accepts any identifier as a rule
        // reference; it is the checker's job to flag `B` as undefined.
        let g = parse(r#"A = B"#);
        assert_eq!(g.rules.len(), 1);
    }

    #[test]
    fn missing_rhs_is_a_syntax_error() {
        let err = Parser::from_source("A =").unwrap().parse().unwrap_err();
        assert_eq!(err.context, "primaryExpr");
    }

    #[test]
    fn trailing_garbage_after_last_rule_is_a_syntax_error() {
        let err = Parser::from_source(r#"A = "a" )"#)
            .unwrap()
            .parse()
            .unwrap_err();
        assert_eq!(err.found, TokenType::RParen);
    }
}
