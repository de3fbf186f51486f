use peggen::compile;
use peggen::error::{CheckError, PegError};

#[test]
fn smallest_grammar_generates_a_parser_for_the_single_rule() {
    let out = compile(r#"A = "a""#, false).expect("a single rule should compile cleanly");
    assert!(out.contains("fn rule_A(&mut self) -> PegResult"));
    assert!(out.contains("self.expect_string(\"a\", 1)"));
}

#[test]
fn ordered_choice_emits_alternatives_in_source_order() {
    let out = compile(r#"A = "if" / "ifx""#, false).expect("ordered choice should compile");
    let if_pos = out.find("\"if\"").expect("first alternative present");
    let ifx_pos = out.find("\"ifx\"").expect("second alternative present");
    assert!(
        if_pos < ifx_pos,
        "the first alternative must be tried (and therefore appear) before the second"
    );
}

#[test]
fn undefined_reference_is_reported_and_blocks_codegen() {
    let err = compile(r#"A = B"#, false).expect_err("a reference to an undeclared rule must fail");
    match err {
        PegError::Check(errors) => {
            assert_eq!(errors, vec![CheckError::UndefinedRule("B".to_string())]);
        }
        other => panic!("expected a Check error, got {other:?}"),
    }
}

#[test]
fn duplicate_rule_is_reported_and_blocks_codegen() {
    let err = compile("A = \"a\"\nA = \"b\"", false)
        .expect_err("two rules sharing a name must fail the check");
    match err {
        PegError::Check(errors) => {
            assert_eq!(errors, vec![CheckError::DuplicateRule("A".to_string())]);
        }
        other => panic!("expected a Check error, got {other:?}"),
    }
}

#[test]
fn check_only_mode_validates_without_emitting_source() {
    let out = compile("A = \"a\" B\nB = \"b\"", true)
        .expect("a well-formed grammar passes --check");
    assert!(out.is_empty());
}

#[test]
fn nested_group_with_label_and_action_round_trips_through_the_whole_pipeline() {
    let out = compile(r#"A = x:("a" / "b") { return x }"#, false)
        .expect("a labeled sub-choice with action code should compile");
    assert!(out.contains("fn ae_code_0"));
    assert!(out.contains("return x"));
}
