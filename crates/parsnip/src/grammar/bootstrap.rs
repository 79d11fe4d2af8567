//! The grammar that reads grammars.
//!
//! The rule syntax is written in itself ([`RULE_SYNTAX`]), which leaves a
//! chicken-and-egg problem: something has to parse that text first. The
//! answer is [`bootstrap_grammar`], a hand-assembled expression graph
//! covering exactly the constructs `RULE_SYNTAX` uses. It parses
//! `RULE_SYNTAX` once; the compiled result supersedes it and handles every
//! user grammar (and can re-read `RULE_SYNTAX` to reproduce itself, which
//! the tests use as a fixed-point check).

use std::sync::LazyLock;

use indexmap::IndexMap;

use super::Grammar;
use super::compile;
use crate::expr::{ExprArena, ExprId, ExprKind, RegexExpr, RegexFlags};

/// The rule syntax, in the rule syntax. Rule names double as the node names
/// grammar compilation dispatches on.
pub(crate) const RULE_SYNTAX: &str = r##"
    # Ignored things (represented by _) hang off the end of the leafmost
    # kinds of nodes. Literals like "/" count as leaves.

    rules = _ rule+
    rule = label equals expression
    equals = "=" _
    literal = spaceless_literal _

    # So you can't spell a regex like ~"..." ilm:
    spaceless_literal = ~"u?r?\"[^\"\\\\]*(?:\\\\.[^\"\\\\]*)*\""is / ~"u?r?'[^'\\\\]*(?:\\\\.[^'\\\\]*)*'"is

    expression = ored / sequence / term
    or_term = "/" _ term
    ored = term or_term+
    sequence = term term+
    not_term = "!" term _
    lookahead_term = "&" term _
    term = not_term / lookahead_term / quantified / atom
    quantified = atom quantifier
    atom = reference / literal / regex / parenthesized
    regex = "~" spaceless_literal ~"[ilmsux]*"i _
    parenthesized = "(" _ expression ")" _
    quantifier = ~"[*+?]" _

    # A subsequent equal sign is the only thing that distinguishes a label
    # (which begins a new rule) from a reference (which is just a pointer
    # to a rule defined somewhere else).
    reference = label !equals
    label = ~"[a-zA-Z_][a-zA-Z_0-9]*" _

    _ = meaninglessness*
    meaninglessness = ~"\s+" / comment
    comment = ~"#[^\r\n]*"
"##;

/// The compiled rule grammar, built on first use and shared process-wide.
pub(crate) fn rule_grammar() -> &'static Grammar {
    static RULE_GRAMMAR: LazyLock<Grammar> = LazyLock::new(|| {
        let boot = bootstrap_grammar();
        let tree = boot
            .parse(RULE_SYNTAX)
            .expect("the bootstrap grammar parses the rule syntax");
        let parts = compile::compile_tree(&tree).expect("the rule syntax compiles");
        Grammar::from_parts(parts, None).expect("the rule syntax starts with its default rule")
    });
    &RULE_GRAMMAR
}

/// Hand-assembles an expression graph able to parse [`RULE_SYNTAX`].
///
/// This is deliberately smaller than the grammar it parses: `RULE_SYNTAX`
/// never uses parenthesized groups, positive lookahead, or single-quoted
/// literals in its own text, so none of those get bootstrap entries.
pub(crate) fn bootstrap_grammar() -> Grammar {
    let mut b = Builder {
        arena: ExprArena::default(),
        rules: IndexMap::new(),
    };

    let comment = b.rx("#[^\r\n]*", RegexFlags::default());
    b.name("comment", comment);

    let ws = b.rx("\\s+", RegexFlags::default());
    let meaninglessness = b.push(ExprKind::OneOf(vec![ws, comment]));
    b.name("meaninglessness", meaninglessness);

    let blank = b.push(ExprKind::ZeroOrMore(meaninglessness));
    b.name("_", blank);

    let eq = b.lit("=");
    let equals = b.push(ExprKind::Sequence(vec![eq, blank]));
    b.name("equals", equals);

    let label_rx = b.rx("[a-zA-Z_][a-zA-Z_0-9]*", RegexFlags::default());
    let label = b.push(ExprKind::Sequence(vec![label_rx, blank]));
    b.name("label", label);

    let not_equals = b.push(ExprKind::Not(equals));
    let reference = b.push(ExprKind::Sequence(vec![label, not_equals]));
    b.name("reference", reference);

    let quantifier_rx = b.rx("[*+?]", RegexFlags::default());
    let quantifier = b.push(ExprKind::Sequence(vec![quantifier_rx, blank]));
    b.name("quantifier", quantifier);

    let spaceless_literal = b.rx(
        "u?r?\"[^\"\\\\]*(?:\\\\.[^\"\\\\]*)*\"",
        RegexFlags {
            ignore_case: true,
            dot_all: true,
            ..RegexFlags::default()
        },
    );
    b.name("spaceless_literal", spaceless_literal);

    let literal = b.push(ExprKind::Sequence(vec![spaceless_literal, blank]));
    b.name("literal", literal);

    let tilde = b.lit("~");
    let flags_rx = b.rx(
        "[ilmsux]*",
        RegexFlags {
            ignore_case: true,
            ..RegexFlags::default()
        },
    );
    let regex = b.push(ExprKind::Sequence(vec![tilde, literal, flags_rx, blank]));
    b.name("regex", regex);

    let atom = b.push(ExprKind::OneOf(vec![reference, literal, regex]));
    b.name("atom", atom);

    let quantified = b.push(ExprKind::Sequence(vec![atom, quantifier]));
    b.name("quantified", quantified);

    // `term` and `not_term` refer to each other; patch `term` afterwards.
    let term = b.push(ExprKind::OneOf(Vec::new()));
    b.name("term", term);

    let bang = b.lit("!");
    let not_term = b.push(ExprKind::Sequence(vec![bang, term, blank]));
    b.name("not_term", not_term);
    b.arena
        .replace_kind(term, ExprKind::OneOf(vec![not_term, quantified, atom]));

    let more_terms = b.push(ExprKind::OneOrMore { inner: term, min: 1 });
    let sequence = b.push(ExprKind::Sequence(vec![term, more_terms]));
    b.name("sequence", sequence);

    let slash = b.lit("/");
    let or_term = b.push(ExprKind::Sequence(vec![slash, blank, term]));
    b.name("or_term", or_term);

    let more_or_terms = b.push(ExprKind::OneOrMore { inner: or_term, min: 1 });
    let ored = b.push(ExprKind::Sequence(vec![term, more_or_terms]));
    b.name("ored", ored);

    let expression = b.push(ExprKind::OneOf(vec![ored, sequence, term]));
    b.name("expression", expression);

    let rule = b.push(ExprKind::Sequence(vec![label, equals, expression]));
    b.name("rule", rule);

    let more_rules = b.push(ExprKind::OneOrMore { inner: rule, min: 1 });
    let rules = b.push(ExprKind::Sequence(vec![blank, more_rules]));
    b.name("rules", rules);

    let Builder { arena, rules: map } = b;
    Grammar::from_raw_parts(arena, map, rules)
}

struct Builder {
    arena: ExprArena,
    rules: IndexMap<String, ExprId>,
}

impl Builder {
    fn push(&mut self, kind: ExprKind) -> ExprId {
        self.arena.push(kind)
    }

    fn lit(&mut self, text: &str) -> ExprId {
        self.arena.push(ExprKind::Literal(text.to_owned()))
    }

    fn rx(&mut self, pattern: &str, flags: RegexFlags) -> ExprId {
        let rx = RegexExpr::new(pattern.to_owned(), flags)
            .expect("bootstrap regexes are hand-checked");
        self.arena.push(ExprKind::Regex(Box::new(rx)))
    }

    fn name(&mut self, name: &str, id: ExprId) {
        self.arena.set_name(id, name);
        self.rules.insert(name.to_owned(), id);
    }
}
