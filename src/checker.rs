use std::collections::HashSet;

use log::debug;

use crate::ast::{ChoiceExpr, Grammar, PrimaryExpr};
use crate::error::CheckError;

/// Runs every semantic pass over a parsed grammar and collects their
/// findings. Unlike the grammar parser, a check failure is never
/// fatal to the next check — all errors are gathered so a user sees
/// every problem in one run rather than fixing them one at a time.
pub fn check(grammar: &Grammar) -> Vec<CheckError> {
    let mut errors = Vec::new();
    let names = duplicate_rules(grammar, &mut errors);
    undefined_references(grammar, &names, &mut errors);
    debug!("check: {} error(s)", errors.len());
    errors
}

/// First pass: every rule name must be unique. Returns the set of
/// names actually declared, for the second pass to check references
/// against — a duplicate still counts as declared.
fn duplicate_rules(grammar: &Grammar, errors: &mut Vec<CheckError>) -> HashSet<String> {
    let mut seen = HashSet::new();
    for rule in &grammar.rules {
        if !seen.insert(rule.name.clone()) {
            errors.push(CheckError::DuplicateRule(rule.name.clone()));
        }
    }
    seen
}

/// Second pass: every rule reference, however deeply nested inside
/// parenthesised sub-choices, must name a declared rule.
fn undefined_references(grammar: &Grammar, names: &HashSet<String>, errors: &mut Vec<CheckError>) {
    for rule in &grammar.rules {
        check_choice(&rule.choice, names, errors);
    }
}

fn check_choice(choice: &ChoiceExpr, names: &HashSet<String>, errors: &mut Vec<CheckError>) {
    for action in &choice.alternatives {
        for part in &action.seq.parts {
            match &part.expr.expr.primary {
                PrimaryExpr::RuleRef(name) => {
                    if !names.contains(name) {
                        errors.push(CheckError::UndefinedRule(name.clone()));
                    }
                }
                PrimaryExpr::SubExpr(sub) => check_choice(sub, names, errors),
                PrimaryExpr::Matcher(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn checked(src: &str) -> Vec<CheckError> {
        let grammar = Parser::from_source(src).unwrap().parse().unwrap();
        check(&grammar)
    }

    #[test]
    fn clean_grammar_has_no_errors() {
        assert!(checked("A = \"a\" B\nB = \"b\"").is_empty());
    }

    #[test]
    fn duplicate_rule_is_reported() {
        let errors = checked("A = \"a\"\nA = \"b\"");
        assert!(errors.contains(&CheckError::DuplicateRule("A".into())));
    }

    #[test]
    fn undefined_reference_is_reported() {
        let errors = checked(r#"A = B"#);
        assert!(errors.contains(&CheckError::UndefinedRule("B".into())));
    }

    #[test]
    fn undefined_reference_nested_in_sub_choice_is_found() {
        let errors = checked(r#"A = ("b" / C)"#);
        assert!(errors.contains(&CheckError::UndefinedRule("C".into())));
    }

    #[test]
    fn self_reference_is_not_undefined() {
        let errors = checked(r#"A = "a" A"#);
        assert!(errors.is_empty());
    }

    #[test]
    fn both_passes_report_independently() {
        let errors = checked("A = B\nA = \"a\"");
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&CheckError::DuplicateRule("A".into())));
        assert!(errors.contains(&CheckError::UndefinedRule("B".into())));
    }
}
