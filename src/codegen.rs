use std::fmt::Write as _;

use log::{debug, trace};

use crate::ast::{
    ActionExpr, ChoiceExpr, Grammar, Matcher, PrefixOp, PrefixedExpr, PrimaryExpr, Rule,
    SuffixOp, SuffixedExpr,
};
use crate::error::CodegenError;

const PREAMBLE: &str = "#![allow(dead_code, unused_variables, unused_parens)]\n\n\
use std::any::Any;\n\n\
pub type PegResult = Option<Box<dyn Any>>;\n\n";

/// The fixed cursor/combinator primitives every generated parser
/// carries, independent of the grammar. `{start}` is the only
/// interpolation point, naming the entry rule's generated function.
const RUNTIME: &str = "\
pub struct Parser {
    src: Vec<char>,
    n: usize,
}

impl Parser {
    pub fn new(src: &str) -> Self {
        Self { src: src.chars().collect(), n: 0 }
    }

    pub fn parse(src: &str) -> PegResult {
        let mut p = Self::new(src);
        p.rule_{start}()
    }

    fn advance(&mut self, n: usize) {
        self.n += n;
    }

    fn back_to(&mut self, n: usize) {
        self.n = n;
    }

    fn expect_dot(&self) -> Option<char> {
        self.src.get(self.n).copied()
    }

    fn expect_string(&self, s: &str, len: usize) -> bool {
        self.n + len <= self.src.len()
            && self.src[self.n..self.n + len].iter().collect::<String>() == s
    }

    fn expect_char(&self, ranges: &[(char, char)]) -> Option<char> {
        let c = *self.src.get(self.n)?;
        ranges
            .iter()
            .any(|(lo, hi)| *lo <= c && c <= *hi)
            .then_some(c)
    }

    fn expect_char_not(&self, ranges: &[(char, char)]) -> Option<char> {
        let c = *self.src.get(self.n)?;
        ranges
            .iter()
            .all(|(lo, hi)| c < *lo || *hi < c)
            .then_some(c)
    }

    fn zero_or_one(p: &mut Parser, mut pe: impl FnMut(&mut Parser) -> PegResult) -> PegResult {
        match pe(p) {
            Some(v) => Some(v),
            None => Some(Box::new(()) as Box<dyn Any>),
        }
    }

    fn one_or_more(p: &mut Parser, mut pe: impl FnMut(&mut Parser) -> PegResult) -> PegResult {
        let mut items: Vec<Box<dyn Any>> = Vec::new();
        match pe(p) {
            Some(v) => items.push(v),
            None => return None,
        }
        while let Some(v) = pe(p) {
            items.push(v);
        }
        Some(Box::new(items))
    }

    fn zero_or_more(p: &mut Parser, mut pe: impl FnMut(&mut Parser) -> PegResult) -> PegResult {
        let mut items: Vec<Box<dyn Any>> = Vec::new();
        while let Some(v) = pe(p) {
            items.push(v);
        }
        Some(Box::new(items))
    }
}

";

/// Walks a checked [`Grammar`] and emits the Rust source of the parser
/// it describes: the fixed runtime, one function per rule, and a
/// trailing block of trampoline functions for inline action code.
///
/// Every emission function takes a `recv` — the name of the `&mut
/// Parser` currently in scope. At the top of a rule it is `self`; once
/// emission descends into a repetition combinator's closure, the
/// closure owns its own `p: &mut Parser` parameter rather than
/// capturing the enclosing one, and `recv` switches to `"p"` for
/// everything emitted inside it. This is what lets the repetition
/// combinators be ordinary associated functions instead of methods
/// that would otherwise fight the closure for a mutable borrow.
pub struct Codegen {
    trampolines: Vec<String>,
    next_trampoline: usize,
    next_label: usize,
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            trampolines: Vec::new(),
            next_trampoline: 0,
            next_label: 0,
        }
    }

    pub fn generate(&mut self, grammar: &Grammar) -> Result<String, CodegenError> {
        let start = grammar.start_rule();
        debug!(
            "codegen: emitting parser for {} rule(s), start rule {:?}",
            grammar.rules.len(),
            start
        );
        let mut out = String::new();
        out.push_str(PREAMBLE);
        out.push_str(&RUNTIME.replace("{start}", start));

        if let Some(code) = &grammar.code {
            out.push_str(code);
            out.push_str("\n\n");
        }

        for rule in &grammar.rules {
            self.emit_rule(&mut out, rule)?;
        }

        if !self.trampolines.is_empty() {
            debug!("codegen: emitting {} trampoline(s)", self.trampolines.len());
            out.push_str("impl Parser {\n");
            for tramp in &self.trampolines {
                out.push_str(tramp);
            }
            out.push_str("}\n");
        }

        Ok(out)
    }

    fn fresh_label(&mut self) -> String {
        let n = self.next_label;
        self.next_label += 1;
        format!("__peg_l{n}")
    }

    fn emit_rule(&mut self, out: &mut String, rule: &Rule) -> Result<(), CodegenError> {
        trace!("codegen: emitting rule {:?}", rule.name);
        let _ = writeln!(out, "// {}", rule.name);
        let _ = writeln!(out, "impl Parser {{");
        let _ = writeln!(out, "    fn rule_{}(&mut self) -> PegResult {{", rule.name);
        let expr = self.emit_choice(&rule.choice, true, 2, "self")?;
        let _ = writeln!(out, "{expr}");
        let _ = writeln!(out, "    }}");
        let _ = writeln!(out, "}}\n");
        Ok(())
    }

    /// Ordered choice: try each alternative in turn against a saved
    /// cursor, rewinding and moving to the next on failure. Commits to
    /// the first alternative that succeeds.
    fn emit_choice(
        &mut self,
        choice: &ChoiceExpr,
        advance: bool,
        indent: usize,
        recv: &str,
    ) -> Result<String, CodegenError> {
        if choice.alternatives.is_empty() {
            return Err(CodegenError("choiceExpr with no alternatives".into()));
        }
        let pad = "    ".repeat(indent);
        let label = self.fresh_label();
        let mut body = String::new();
        let _ = writeln!(body, "'{label}: {{");
        for action in &choice.alternatives {
            let mark = self.fresh_label();
            let _ = writeln!(body, "{pad}    let {mark} = {recv}.n;");
            let action_expr = self.emit_action(action, advance, indent + 1, recv)?;
            let _ = writeln!(body, "{pad}    let __r = {action_expr};");
            let _ = writeln!(body, "{pad}    if __r.is_some() {{ break '{label} __r; }}");
            let _ = writeln!(body, "{pad}    {recv}.back_to({mark});");
        }
        let _ = writeln!(body, "{pad}    None");
        let _ = write!(body, "{pad}}}");
        Ok(body)
    }

    /// A sequence of labeled parts, each of which must match for the
    /// whole action to succeed; the final action code (if any) runs
    /// against the bound captures, otherwise the plain value(s) pass
    /// through.
    fn emit_action(
        &mut self,
        action: &ActionExpr,
        advance: bool,
        indent: usize,
        recv: &str,
    ) -> Result<String, CodegenError> {
        let pad = "    ".repeat(indent);
        let label = self.fresh_label();
        let has_label = action.seq.parts.iter().any(|p| p.label.is_some());

        let mut names = Vec::new();
        let mut body = String::new();
        let _ = writeln!(body, "'{label}: {{");
        for (n, part) in action.seq.parts.iter().enumerate() {
            let name = if has_label {
                part.label.clone().unwrap_or_else(|| "_".to_string())
            } else {
                format!("__peg_v{n}")
            };
            let expr = self.emit_prefixed(&part.expr, advance, indent + 1, recv)?;
            let _ = writeln!(body, "{pad}    let __v = {expr};");
            let _ = writeln!(
                body,
                "{pad}    let {name} = match __v {{ Some(v) => v, None => break '{label} None }};"
            );
            if name != "_" {
                names.push(name);
            }
        }

        let tail = match &action.code {
            Some(code) => {
                let idx = self.next_trampoline;
                self.next_trampoline += 1;
                self.trampolines
                    .push(self.render_trampoline(idx, &names, code));
                format!(
                    "{recv}.ae_code_{idx}({})",
                    names.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(", ")
                )
            }
            None => match names.as_slice() {
                [] => return Err(CodegenError("actionExpr binds no values".into())),
                [single] => single.clone(),
                many => format!(
                    "Box::new(vec![{}]) as Box<dyn std::any::Any>",
                    many.join(", ")
                ),
            },
        };

        let wrapped = if action.code.is_some() {
            tail
        } else {
            format!("Some({tail})")
        };
        let _ = writeln!(body, "{pad}    break '{label} {wrapped};");
        let _ = write!(body, "{pad}}}");
        Ok(body)
    }

    fn render_trampoline(&self, idx: usize, names: &[String], code: &str) -> String {
        let params = names
            .iter()
            .map(|n| format!("{n}: Box<dyn std::any::Any>"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "    fn ae_code_{idx}(&mut self, {params}) -> PegResult {{\n        Some(Box::new({{ {code} }}) as Box<dyn std::any::Any>)\n    }}\n"
        )
    }

    /// `&e` / `!e` never consume input: the cursor is rewound
    /// unconditionally after probing, regardless of how far the
    /// wrapped expression advanced it.
    fn emit_prefixed(
        &mut self,
        prefixed: &PrefixedExpr,
        advance: bool,
        indent: usize,
        recv: &str,
    ) -> Result<String, CodegenError> {
        let suffixed = self.emit_suffixed(
            &prefixed.expr,
            advance && prefixed.op.is_none(),
            indent,
            recv,
        )?;
        match prefixed.op {
            None => Ok(suffixed),
            Some(op) => {
                let pad = "    ".repeat(indent);
                let positive = matches!(op, PrefixOp::And);
                let test = if positive { "is_some()" } else { "is_none()" };
                Ok(format!(
                    "{{\n{pad}    let __mark = {recv}.n;\n{pad}    let __look = {suffixed};\n{pad}    {recv}.back_to(__mark);\n{pad}    if __look.{test} {{ Some(Box::new(()) as Box<dyn std::any::Any>) }} else {{ None }}\n{pad}}}"
                ))
            }
        }
    }

    /// `e?` / `e+` / `e*` via the generated combinators; a bare
    /// expression with no suffix is emitted directly. The repeated
    /// expression runs inside a closure taking its own `p`, so it is
    /// emitted with `recv` switched to `"p"`.
    fn emit_suffixed(
        &mut self,
        suffixed: &SuffixedExpr,
        advance: bool,
        indent: usize,
        recv: &str,
    ) -> Result<String, CodegenError> {
        match suffixed.op {
            None => self.emit_primary(&suffixed.primary, advance, indent, recv),
            Some(op) => {
                let combinator = match op {
                    SuffixOp::Question => "zero_or_one",
                    SuffixOp::Plus => "one_or_more",
                    SuffixOp::Star => "zero_or_more",
                };
                let pad = "    ".repeat(indent);
                let primary = self.emit_primary(&suffixed.primary, advance, indent + 1, "p")?;
                Ok(format!(
                    "Parser::{combinator}({recv}, |p: &mut Parser| {{\n{pad}    {primary}\n{pad}}})"
                ))
            }
        }
    }

    fn emit_primary(
        &mut self,
        primary: &PrimaryExpr,
        advance: bool,
        indent: usize,
        recv: &str,
    ) -> Result<String, CodegenError> {
        match primary {
            PrimaryExpr::Matcher(Matcher::Literal(s)) => {
                let len = s.chars().count();
                let maybe_advance = if advance {
                    format!("{recv}.advance({len}); ")
                } else {
                    String::new()
                };
                Ok(format!(
                    "if {recv}.expect_string({s:?}, {len}) {{ {maybe_advance}Some(Box::new({s:?}.to_string()) as Box<dyn std::any::Any>) }} else {{ None }}"
                ))
            }
            PrimaryExpr::Matcher(Matcher::AnyChar) => {
                let maybe_advance = if advance {
                    format!("{recv}.advance(1); ")
                } else {
                    String::new()
                };
                Ok(format!(
                    "if let Some(c) = {recv}.expect_dot() {{ {maybe_advance}Some(Box::new(c) as Box<dyn std::any::Any>) }} else {{ None }}"
                ))
            }
            PrimaryExpr::Matcher(Matcher::CharRange(cr)) => {
                let ranges = cr
                    .ranges
                    .iter()
                    .map(|span| format!("({:?}, {:?})", span.start, span.end))
                    .collect::<Vec<_>>()
                    .join(", ");
                let method = if cr.not { "expect_char_not" } else { "expect_char" };
                let maybe_advance = if advance {
                    format!("{recv}.advance(1); ")
                } else {
                    String::new()
                };
                Ok(format!(
                    "if let Some(c) = {recv}.{method}(&[{ranges}]) {{ {maybe_advance}Some(Box::new(c) as Box<dyn std::any::Any>) }} else {{ None }}"
                ))
            }
            PrimaryExpr::RuleRef(name) => Ok(format!("{recv}.rule_{name}()")),
            PrimaryExpr::SubExpr(sub) => self.emit_choice(sub, advance, indent, recv),
        }
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser as GrammarParser;

    fn generate(src: &str) -> String {
        let grammar = GrammarParser::from_source(src).unwrap().parse().unwrap();
        Codegen::new().generate(&grammar).unwrap()
    }

    #[test]
    fn smallest_grammar_emits_one_rule_function() {
        let out = generate(r#"A = "a""#);
        assert!(out.contains("fn rule_A(&mut self) -> PegResult"));
        assert!(out.contains("expect_string(\"a\", 1)"));
    }

    #[test]
    fn emitted_entry_point_calls_the_start_rule() {
        let out = generate(r#"A = "a""#);
        assert!(out.contains("p.rule_A()"));
    }

    #[test]
    fn prologue_code_is_emitted_before_rule_functions() {
        let out = generate(r#"{ const X: i32 = 1; }A = "a""#);
        let prologue_at = out.find("const X").unwrap();
        let rule_at = out.find("fn rule_A").unwrap();
        assert!(prologue_at < rule_at);
    }

    #[test]
    fn action_code_becomes_a_trampoline_call() {
        let out = generate(r#"A = x:"a" { x }"#);
        assert!(out.contains("self.ae_code_0(x)"));
        assert!(out.contains("fn ae_code_0(&mut self, x: Box<dyn std::any::Any>)"));
    }

    #[test]
    fn repetition_operators_use_the_matching_combinator() {
        let out = generate(r#"A = "a"+ "b"* "c"?"#);
        assert!(out.contains("Parser::one_or_more"));
        assert!(out.contains("Parser::zero_or_more"));
        assert!(out.contains("Parser::zero_or_one"));
    }

    #[test]
    fn zero_or_one_unwraps_the_matched_value_instead_of_rewrapping_the_option() {
        let out = generate(r#"A = "a""#);
        assert!(out.contains("fn zero_or_one(p: &mut Parser, mut pe: impl FnMut(&mut Parser) -> PegResult) -> PegResult {"));
        assert!(out.contains("Some(v) => Some(v),"));
        assert!(out.contains("None => Some(Box::new(()) as Box<dyn Any>),"));
        assert!(!out.contains("Some(Box::new(pe(p)))"));
    }

    #[test]
    fn repeated_matcher_runs_against_the_closures_own_parser() {
        let out = generate(r#"A = "a"+"#);
        assert!(out.contains("|p: &mut Parser| {"));
        assert!(out.contains("p.expect_string"));
        assert!(out.contains("p.advance"));
    }

    #[test]
    fn lookahead_rewinds_the_cursor_unconditionally() {
        let out = generate(r#"A = &"a" "a""#);
        assert!(out.contains("self.back_to(__mark)"));
        assert!(out.contains("is_some()"));
    }

    #[test]
    fn negative_lookahead_inverts_the_test() {
        let out = generate(r#"A = !"a" "b""#);
        assert!(out.contains("is_none()"));
    }

    #[test]
    fn rule_reference_calls_the_referenced_rule_function() {
        let out = generate("A = B\nB = \"b\"");
        assert!(out.contains("self.rule_B()"));
    }

    #[test]
    fn char_range_is_rendered_as_a_span_array() {
        let out = generate(r#"A = [a-z]"#);
        assert!(out.contains("expect_char(&[('a', 'z')])"));
    }

    #[test]
    fn negated_char_range_uses_expect_char_not() {
        let out = generate(r#"A = [^a-z]"#);
        assert!(out.contains("expect_char_not"));
    }

    #[test]
    fn any_char_matcher_uses_expect_dot() {
        let out = generate(r#"A = ."#);
        assert!(out.contains("expect_dot()"));
    }
}
