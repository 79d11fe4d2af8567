use indoc::indoc;

use super::Grammar;
use crate::error::{GrammarError, ParseErrorKind};

const BOLD: &str = indoc! {r#"
    bold_text  = bold_open text bold_close
    text       = ~"[A-Z 0-9]*"i
    bold_open  = "(("
    bold_close = "))"
"#};

#[test]
fn rules_are_looked_up_by_name() {
    let g = Grammar::new(BOLD).unwrap();
    let rule = g.rule("bold_open").expect("rule exists");
    assert_eq!(rule.name(), "bold_open");
    assert!(g.rule("missing").is_none());
}

#[test]
fn rules_iterate_in_definition_order() {
    let g = Grammar::new(BOLD).unwrap();
    let names: Vec<&str> = g.rules().map(|(name, _)| name).collect();
    assert_eq!(names, ["bold_text", "text", "bold_open", "bold_close"]);
}

#[test]
fn any_rule_can_be_a_start_symbol() {
    let g = Grammar::new(BOLD).unwrap();
    let open = g.rule("bold_open").unwrap();
    assert!(open.parse("((").is_ok());
    assert!(open.parse("((HI))").is_err());
    assert!(open.match_from("((HI))", 0).is_ok());
}

#[test]
fn the_first_rule_is_the_default() {
    let g = Grammar::new(BOLD).unwrap();
    assert_eq!(g.default_rule().name(), "bold_text");
    assert!(g.parse("((HI 42))").is_ok());
}

#[test]
fn with_default_overrides_the_start_rule() {
    let g = Grammar::with_default(BOLD, "text").unwrap();
    assert_eq!(g.default_rule().name(), "text");
    assert!(g.parse("HI 42").is_ok());

    let err = Grammar::with_default(BOLD, "nope").unwrap_err();
    assert!(matches!(err, GrammarError::UndefinedLabel { label } if label == "nope"));
}

#[test]
fn default_returns_a_view_sharing_the_rules() {
    let g = Grammar::new(BOLD).unwrap();
    let text_view = g.default("text").unwrap();
    assert!(text_view.parse("HI 42").is_ok());
    // The original is untouched.
    assert_eq!(g.default_rule().name(), "bold_text");

    assert!(matches!(
        g.default("nope"),
        Err(GrammarError::UndefinedLabel { .. })
    ));
}

#[test]
fn try_from_compiles_source_text() {
    let g = Grammar::try_from(r#"greeting = "hi""#).unwrap();
    assert!(g.parse("hi").is_ok());
}

#[test]
fn display_renders_one_rule_per_line() {
    let g = Grammar::new(BOLD).unwrap();
    insta::assert_snapshot!(g.to_string(), @r#"
    bold_text = bold_open text bold_close
    text = ~"[A-Z 0-9]*"i
    bold_open = "(("
    bold_close = "))"
    "#);
}

#[test]
fn parse_requires_consuming_the_whole_text() {
    let g = Grammar::new(r#"g = "ab""#).unwrap();
    let err = g.parse("abc").unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::Incomplete);
    assert_eq!(err.pos(), 2);

    let node = g.match_from("abc", 0).unwrap();
    assert_eq!(node.end(), 2);
}

#[test]
fn parse_from_starts_mid_text() {
    let g = Grammar::new(r#"g = "cd""#).unwrap();
    assert!(g.parse_from("abcd", 2).is_ok());
    assert!(g.parse_from("abcd", 0).is_err());
}

#[test]
fn out_of_bounds_positions_fail_cleanly() {
    let g = Grammar::new(r#"g = "x""#).unwrap();
    let err = g.match_from("x", 5).unwrap_err();
    assert_eq!(err.pos(), 5);
}

#[test]
fn matching_at_the_end_of_text_is_allowed() {
    let g = Grammar::new(r#"g = "x"?"#).unwrap();
    let node = g.match_from("x", 1).unwrap();
    assert_eq!((node.start(), node.end()), (1, 1));
}

#[test]
fn grammars_are_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Grammar>();

    let g = Grammar::new(BOLD).unwrap();
    std::thread::scope(|scope| {
        for input in ["((A))", "((B 1))", "(("] {
            let g = &g;
            scope.spawn(move || {
                let _ = g.parse(input);
            });
        }
    });
}

#[test]
fn error_display_includes_line_and_column() {
    let g = Grammar::new(BOLD).unwrap();
    let err = g.parse("((HI 42").unwrap_err();
    assert_eq!(err.line(), 1);
    assert_eq!(err.column(), 8);
    assert!(err.to_string().contains("line 1, column 8"));
}
