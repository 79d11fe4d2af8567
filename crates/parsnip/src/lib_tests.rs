//! End-to-end scenarios exercising the grammar, matcher, and error paths
//! together.

use indoc::indoc;

use crate::error::ParseErrorKind;
use crate::grammar::Grammar;
use crate::node::Node;

#[test]
fn single_regex_rule_yields_a_single_node() {
    let g = Grammar::new(r#"number = ~"[0-9]+""#).unwrap();
    let text = "98";
    let node = g.parse(text).unwrap();
    assert_eq!(node, Node::leaf("number", text, 0, 2));
    assert!(node.children().is_empty());
}

#[test]
fn bold_text_parses_into_three_children() {
    let g = Grammar::new(indoc! {r#"
        bold_text  = bold_open text bold_close
        text       = ~"[A-Z 0-9]*"i
        bold_open  = "(("
        bold_close = "))"
    "#})
    .unwrap();

    let tree = g.parse("((HI 42))").unwrap();
    insta::assert_snapshot!(tree.pretty(), @r#"
    bold_text "((HI 42))"
      bold_open "(("
      text "HI 42"
      bold_close "))"
    "#);
}

#[test]
fn ordered_choice_commits_to_the_first_success() {
    let g = Grammar::new(r#"g = "hi" / "howdy""#).unwrap();

    let howdy = g.parse("howdy").unwrap();
    assert_eq!(howdy.children().len(), 1);
    assert_eq!(
        (howdy.children()[0].start(), howdy.children()[0].end()),
        (0, 5)
    );

    let hi = g.parse("hi").unwrap();
    assert_eq!((hi.children()[0].start(), hi.children()[0].end()), (0, 2));

    let err = g.parse("hello").unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::Mismatch);
    assert_eq!(err.pos(), 0);
    assert_eq!(err.rule_name(), "g");
}

#[test]
fn incomplete_parse_reports_the_first_unconsumed_offset() {
    let g = Grammar::new(r#"g = "chitty" (" " "bang")+"#).unwrap();
    let err = g.parse("chitty bangbang").unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::Incomplete);
    assert_eq!(err.pos(), 11);
    assert_eq!(err.rule_name(), "g");
}

#[test]
fn lookahead_tests_without_consuming() {
    let g = Grammar::new(r#"g = &"a" ~"[a-z]+""#).unwrap();

    let tree = g.parse("arp").unwrap();
    assert_eq!(tree.children().len(), 2);
    let ahead = &tree.children()[0];
    assert_eq!((ahead.start(), ahead.end()), (0, 0));
    let word = &tree.children()[1];
    assert_eq!((word.start(), word.end()), (0, 3));

    let err = g.parse("burp").unwrap_err();
    assert_eq!(err.pos(), 0);
    assert_eq!(err.rule_name(), "g");
}

#[test]
fn self_referencing_rules_recurse_safely() {
    let g = Grammar::new(indoc! {r#"
        digits = digit digits?
        digit = ~"[0-9]"
    "#})
    .unwrap();

    let tree = g.parse("12").unwrap();
    assert_eq!((tree.start(), tree.end()), (0, 2));

    let long = "9".repeat(2000);
    assert!(g.parse(&long).is_ok());
}

#[test]
fn empty_input_succeeds_only_for_nullable_rules() {
    let nullable = Grammar::new(r#"g = "a"*"#).unwrap();
    let node = nullable.parse("").unwrap();
    assert_eq!((node.start(), node.end()), (0, 0));

    let strict = Grammar::new(r#"g = "a"+"#).unwrap();
    let err = strict.parse("").unwrap_err();
    assert_eq!(err.pos(), 0);
}

#[test]
fn match_nodes_start_where_asked_and_stay_in_bounds() {
    let g = Grammar::new(indoc! {r#"
        pair = word " " word
        word = ~"[a-z]+"
    "#})
    .unwrap();
    let text = "xy hello world";
    let node = g.match_from(text, 3).unwrap();
    assert_eq!(node.start(), 3);
    assert!(node.end() <= text.len());
    assert_eq!(node.text(), "hello world");
}

#[test]
fn sequence_children_tile_the_parent_span() {
    let g = Grammar::new(indoc! {r#"
        date = year "-" month
        year = ~"[0-9]{4}"
        month = ~"[0-9]{2}"
    "#})
    .unwrap();
    let node = g.parse("2023-11").unwrap();

    let mut pos = node.start();
    for child in node.children() {
        assert_eq!(child.start(), pos);
        pos = child.end();
    }
    assert_eq!(pos, node.end());
}

#[test]
fn choice_nodes_wrap_exactly_one_child_with_the_same_span() {
    let g = Grammar::new(r#"g = ~"[0-9]+" / ~"[a-z]+""#).unwrap();
    for input in ["123", "abc"] {
        let node = g.parse(input).unwrap();
        assert_eq!(node.children().len(), 1);
        let child = &node.children()[0];
        assert_eq!((child.start(), child.end()), (node.start(), node.end()));
    }
}

#[test]
fn deeply_nested_input_does_not_overflow_the_stack() {
    let g = Grammar::new(indoc! {r#"
        expr = ("(" expr ")") / "x"
    "#})
    .unwrap();
    let depth = 20_000;
    let input = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
    let node = g.parse(&input).unwrap();
    assert_eq!(node.end(), input.len());
}

#[test]
fn multibyte_input_keeps_byte_spans_consistent() {
    let g = Grammar::new(r#"g = "héllo" ~"\s*""#).unwrap();
    let text = "héllo ";
    let node = g.parse(text).unwrap();
    assert_eq!(node.end(), text.len());
    assert_eq!(node.children()[0].text(), "héllo");
}
