use std::collections::HashSet;

use indoc::indoc;

use crate::error::ParseErrorKind;
use crate::grammar::Grammar;
use crate::matcher::MatchContext;

fn grammar(source: &str) -> Grammar {
    Grammar::new(source).expect("valid grammar")
}

#[test]
fn literal_matches_at_offset() {
    let g = grammar(r#"g = "hello""#);
    let node = g.match_from("xhello world", 1).unwrap();
    assert_eq!((node.start(), node.end()), (1, 6));
    assert!(g.match_from("xhello", 0).is_err());
}

#[test]
fn empty_literal_matches_anywhere() {
    let g = grammar(r#"g = """#);
    let node = g.match_from("abc", 2).unwrap();
    assert_eq!((node.start(), node.end()), (2, 2));
}

#[test]
fn regex_is_anchored_at_the_position() {
    let g = grammar(r#"g = ~"[a-z]+""#);
    // A match exists later in the text but not at the requested position.
    assert!(g.match_from("AB cd", 0).is_err());
    let node = g.match_from("AB cd", 3).unwrap();
    assert_eq!((node.start(), node.end()), (3, 5));
}

#[test]
fn regex_node_carries_captures() {
    let g = grammar(r#"g = ~"([a-z]+)=([0-9]+)""#);
    let node = g.parse("key=42").unwrap();
    let captures = node.captures().expect("regex nodes carry captures");
    assert_eq!(captures.get_group(1).map(|s| (s.start, s.end)), Some((0, 3)));
    assert_eq!(captures.get_group(2).map(|s| (s.start, s.end)), Some((4, 6)));
}

#[test]
fn sequence_spans_are_contiguous() {
    let g = grammar(indoc! {r#"
        pair = left right
        left = "ab"
        right = ~"[0-9]+"
    "#});
    let node = g.parse("ab123").unwrap();
    assert_eq!(node.children().len(), 2);
    assert_eq!(node.children()[0].end(), node.children()[1].start());
    assert_eq!((node.start(), node.end()), (0, 5));
}

#[test]
fn one_of_takes_the_first_alternative_that_matches() {
    // "h" would also start "hi"; ordered choice commits to the first win.
    let g = grammar(r#"g = "h" / "hi""#);
    let node = g.match_from("hi", 0).unwrap();
    assert_eq!(node.children().len(), 1);
    assert_eq!(node.children()[0].end(), 1);
}

#[test]
fn lookahead_is_zero_width() {
    let g = grammar(r#"g = &"ab" "a""#);
    // &"ab" needs "ab" present; "a" alone fails.
    let err = g.parse("a").unwrap_err();
    assert_eq!(err.pos(), 0);

    let node = g.match_from("ab", 0).unwrap();
    let lookahead = &node.children()[0];
    assert_eq!((lookahead.start(), lookahead.end()), (0, 0));
    assert_eq!(node.end(), 1);
}

#[test]
fn negative_lookahead_consumes_nothing() {
    let g = grammar(r#"g = !"b" ~"[a-z]""#);
    let node = g.parse("a").unwrap();
    assert_eq!(node.children()[0].end(), 0);
    assert!(g.parse("b").is_err());
}

#[test]
fn optional_wraps_or_stays_empty() {
    let g = grammar(r#"g = "a" "b"?"#);
    let with = g.parse("ab").unwrap();
    assert_eq!(with.children()[1].children().len(), 1);

    let without = g.parse("a").unwrap();
    let opt = &without.children()[1];
    assert_eq!(opt.children().len(), 0);
    assert_eq!((opt.start(), opt.end()), (1, 1));
}

#[test]
fn zero_or_more_is_greedy_and_always_succeeds() {
    let g = grammar(r#"g = "a"*"#);
    assert_eq!(g.parse("aaa").unwrap().children().len(), 3);
    let empty = g.parse("").unwrap();
    assert_eq!((empty.start(), empty.end()), (0, 0));
}

#[test]
fn one_or_more_requires_a_match() {
    let g = grammar(r#"g = "a"+"#);
    assert_eq!(g.parse("aa").unwrap().children().len(), 2);
    assert!(g.parse("").is_err());
}

#[test]
fn repetition_stops_at_a_zero_width_match() {
    let g = grammar(r#"g = ~"z*"*"#);
    // The inner expression always succeeds; a zero-width iteration must
    // terminate the loop instead of spinning.
    let node = g.parse("zz").unwrap();
    assert_eq!(node.end(), 2);
    let empty = g.parse("").unwrap();
    assert_eq!(empty.end(), 0);

    let plus = grammar(r#"g = ~"z*"+"#);
    let node = plus.parse("").unwrap();
    assert_eq!(node.end(), 0);
}

#[test]
fn one_or_more_respects_larger_minimums() {
    use crate::expr::{ExprArena, ExprKind};

    // The rule syntax only spells `min = 1`; larger minimums are built in
    // code.
    let mut arena = ExprArena::default();
    let a = arena.push(ExprKind::Literal("a".into()));
    let two_or_more = arena.push(ExprKind::OneOrMore { inner: a, min: 2 });

    let mut ctx = MatchContext::new(&arena, "aaa");
    assert!(ctx.match_expr(two_or_more, 0).is_some());

    let mut ctx = MatchContext::new(&arena, "a");
    assert!(ctx.match_expr(two_or_more, 0).is_none());
}

#[test]
fn failure_blames_the_furthest_position() {
    let g = grammar(indoc! {r#"
        g = "ab" "cd"
    "#});
    let err = g.parse("abxx").unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::Mismatch);
    assert_eq!(err.pos(), 2);
}

#[test]
fn named_expressions_win_the_blame_at_equal_positions() {
    let g = grammar(r#"g = "hi" / "howdy""#);
    let err = g.parse("hello").unwrap_err();
    assert_eq!(err.pos(), 0);
    assert_eq!(err.rule_name(), "g");
}

#[test]
fn each_expression_position_pair_is_evaluated_at_most_once() {
    let g = grammar(indoc! {r#"
        g = (stars "b") / (stars "c")
        stars = "*"+
    "#});
    let mut ctx = MatchContext::new(g.arena(), "***c");
    let node = ctx.match_expr(g.expr_id("g"), 0);
    assert!(node.is_some());

    // The second alternative re-asks for `stars` at position 0; the packrat
    // cache must answer it without a second evaluation.
    let mut seen = HashSet::new();
    for key in &ctx.evaluations {
        assert!(seen.insert(*key), "{key:?} evaluated more than once");
    }
}

#[test]
fn failed_outcomes_are_cached_too() {
    let g = grammar(indoc! {r#"
        g = (word "!") / (word "?")
        word = ~"[a-z]+"
    "#});
    let mut ctx = MatchContext::new(g.arena(), "123");
    assert!(ctx.match_expr(g.expr_id("g"), 0).is_none());

    let word = g.expr_id("word");
    let misses = ctx
        .evaluations
        .iter()
        .filter(|&&(id, pos)| id == word && pos == 0)
        .count();
    assert_eq!(misses, 1);
}
