//! Compiles a rule-syntax parse tree into an expression arena.
//!
//! Two passes. The construction pass is a [`NodeVisitor`] over the tree
//! (the library's own traversal protocol compiles its own grammars): each
//! handler emits a fresh expression, and a label in atom position becomes a
//! [`ExprKind::LazyRef`] placeholder. The resolution pass then rewrites
//! every placeholder to the expression its label names, chasing chains of
//! references with a seen-set so cyclic rules terminate.

use indexmap::IndexMap;

use crate::error::GrammarError;
use crate::expr::{ExprArena, ExprId, ExprKind, RegexExpr, RegexFlags};
use crate::node::Node;
use crate::visitor::{HandlerError, NodeVisitor, VisitationError};

/// Everything a compiled grammar is made of, before a default rule is
/// chosen.
pub(crate) struct GrammarParts {
    pub(crate) arena: ExprArena,
    pub(crate) rules: IndexMap<String, ExprId>,
    pub(crate) first_rule: String,
}

pub(crate) fn compile_tree(tree: &Node<'_>) -> Result<GrammarParts, GrammarError> {
    let mut visitor = RuleVisitor {
        arena: ExprArena::default(),
    };
    let value = visitor.visit(tree).map_err(|error| match error {
        VisitationError::Passthrough(error) => error,
        // Every rule of the rule syntax has a handler and pass_through
        // covers every error, so nothing else can come back.
        other => unreachable!("unexpected visitation outcome: {other}"),
    })?;
    let RuleValue::Rules(mut rules, first_rule) = value else {
        unreachable!("visiting a rule-syntax tree yields the rule map");
    };
    let mut arena = visitor.arena;
    resolve_refs(&mut arena, &mut rules)?;
    Ok(GrammarParts {
        arena,
        rules,
        first_rule,
    })
}

/// Intermediate value flowing up the tree during compilation. Structural
/// rules (`_`, `equals`, quantifier symbols, ...) fall through
/// `generic_visit`, which forwards child values or the matched text.
#[derive(Debug)]
enum RuleValue {
    Expr(ExprId),
    Text(String),
    List(Vec<RuleValue>),
    Rules(IndexMap<String, ExprId>, String),
}

impl RuleValue {
    fn expect_expr(self) -> ExprId {
        match self {
            RuleValue::Expr(id) => id,
            other => unreachable!("expected an expression, got {other:?}"),
        }
    }

    fn expect_text(self) -> String {
        match self {
            RuleValue::Text(text) => text,
            other => unreachable!("expected matched text, got {other:?}"),
        }
    }

    fn expect_list(self) -> Vec<RuleValue> {
        match self {
            RuleValue::List(values) => values,
            other => unreachable!("expected a value list, got {other:?}"),
        }
    }
}

struct RuleVisitor {
    arena: ExprArena,
}

impl RuleVisitor {
    fn push(&mut self, kind: ExprKind) -> RuleValue {
        RuleValue::Expr(self.arena.push(kind))
    }

    fn visit_rules(&mut self, children: Vec<RuleValue>) -> RuleValue {
        let Ok([_ws, rule_list]) = <[RuleValue; 2]>::try_from(children) else {
            unreachable!("rules = _ rule+");
        };
        let mut rules = IndexMap::new();
        let mut first = None;
        for value in rule_list.expect_list() {
            let id = value.expect_expr();
            let name = self.arena[id].name.clone();
            if first.is_none() {
                first = Some(name.clone());
            }
            // Later definitions override earlier ones, keeping first-seen
            // order.
            rules.insert(name, id);
        }
        let first = first.expect("the rule syntax requires at least one rule");
        RuleValue::Rules(rules, first)
    }

    fn visit_rule(&mut self, children: Vec<RuleValue>) -> RuleValue {
        let Ok([label, _equals, expression]) = <[RuleValue; 3]>::try_from(children) else {
            unreachable!("rule = label equals expression");
        };
        let id = expression.expect_expr();
        self.arena.set_name(id, &label.expect_text());
        RuleValue::Expr(id)
    }

    fn visit_ored(&mut self, children: Vec<RuleValue>) -> RuleValue {
        let Ok([first, rest]) = <[RuleValue; 2]>::try_from(children) else {
            unreachable!("ored = term or_term+");
        };
        let mut members = vec![first.expect_expr()];
        members.extend(rest.expect_list().into_iter().map(RuleValue::expect_expr));
        self.push(ExprKind::OneOf(members))
    }

    fn visit_sequence(&mut self, children: Vec<RuleValue>) -> RuleValue {
        let Ok([first, rest]) = <[RuleValue; 2]>::try_from(children) else {
            unreachable!("sequence = term term+");
        };
        let mut members = vec![first.expect_expr()];
        members.extend(rest.expect_list().into_iter().map(RuleValue::expect_expr));
        self.push(ExprKind::Sequence(members))
    }

    fn visit_quantified(&mut self, children: Vec<RuleValue>) -> RuleValue {
        let Ok([atom, quantifier]) = <[RuleValue; 2]>::try_from(children) else {
            unreachable!("quantified = atom quantifier");
        };
        let inner = atom.expect_expr();
        match quantifier.expect_text().as_str() {
            "?" => self.push(ExprKind::Optional(inner)),
            "*" => self.push(ExprKind::ZeroOrMore(inner)),
            "+" => self.push(ExprKind::OneOrMore { inner, min: 1 }),
            other => unreachable!("quantifier = ~\"[*+?]\", got {other:?}"),
        }
    }

    fn visit_regex(&mut self, children: Vec<RuleValue>) -> Result<RuleValue, GrammarError> {
        let Ok([_tilde, literal, flags, _ws]) = <[RuleValue; 4]>::try_from(children) else {
            unreachable!("regex = \"~\" spaceless_literal flags _");
        };
        let pattern = match &self.arena[literal.expect_expr()].kind {
            ExprKind::Literal(pattern) => pattern.clone(),
            other => unreachable!("regex patterns are literals, got {other:?}"),
        };
        let flags = parse_flags(&flags.expect_text());
        let rx = RegexExpr::new(pattern, flags)?;
        Ok(self.push(ExprKind::Regex(Box::new(rx))))
    }
}

impl NodeVisitor for RuleVisitor {
    type Output = RuleValue;
    type Error = GrammarError;

    fn visit_node(
        &mut self,
        node: &Node<'_>,
        mut children: Vec<RuleValue>,
    ) -> Result<RuleValue, HandlerError<GrammarError>> {
        let value = match node.rule_name() {
            "rules" => self.visit_rules(children),
            "rule" => self.visit_rule(children),
            "ored" => self.visit_ored(children),
            "sequence" => self.visit_sequence(children),
            "quantified" => self.visit_quantified(children),
            "regex" => self.visit_regex(children)?,

            // `or_term = "/" _ term`: only the term matters.
            "or_term" => children.swap_remove(2),
            "not_term" => {
                let inner = children.swap_remove(1).expect_expr();
                self.push(ExprKind::Not(inner))
            }
            "lookahead_term" => {
                let inner = children.swap_remove(1).expect_expr();
                self.push(ExprKind::Lookahead(inner))
            }
            // `parenthesized = "(" _ expression ")" _`
            "parenthesized" => children.swap_remove(2),
            "reference" => {
                let label = children.swap_remove(0).expect_text();
                self.push(ExprKind::LazyRef(label))
            }
            // `literal = spaceless_literal _`
            "literal" => children.swap_remove(0),
            "spaceless_literal" => {
                let literal = unescape_literal(node.text())?;
                self.push(ExprKind::Literal(literal))
            }
            // `label = ~"[a-zA-Z_][a-zA-Z_0-9]*" _`: the identifier text.
            "label" => RuleValue::Text(children.swap_remove(0).expect_text()),
            // `quantifier = ~"[*+?]" _`: the symbol.
            "quantifier" => RuleValue::Text(children.swap_remove(0).expect_text()),

            // Single-alternative wrappers.
            "expression" | "term" | "atom" => self.lift_child(node, children)?,

            // Whitespace, comments, `equals`, and anything a grammar-syntax
            // extension might add.
            _ => self.generic_visit(node, children)?,
        };
        Ok(value)
    }

    /// Anonymous nodes forward their children; childless ones their text.
    fn generic_visit(
        &mut self,
        node: &Node<'_>,
        children: Vec<RuleValue>,
    ) -> Result<RuleValue, HandlerError<GrammarError>> {
        if children.is_empty() {
            Ok(RuleValue::Text(node.text().to_owned()))
        } else {
            Ok(RuleValue::List(children))
        }
    }

    /// Compile errors are already typed; surface them unwrapped.
    fn pass_through(&self, _error: &GrammarError) -> bool {
        true
    }
}

fn parse_flags(text: &str) -> RegexFlags {
    let mut flags = RegexFlags::default();
    for c in text.chars() {
        match c.to_ascii_lowercase() {
            'i' => flags.ignore_case = true,
            'l' => flags.locale = true,
            'm' => flags.multiline = true,
            's' => flags.dot_all = true,
            'u' => flags.unicode = true,
            'x' => flags.verbose = true,
            other => unreachable!("flag run is constrained to [ilmsux], got {other:?}"),
        }
    }
    flags
}

/// Evaluates a quoted literal as matched by `spaceless_literal`: optional
/// `u` and `r` prefixes, surrounding quotes, and backslash escapes. The `r`
/// prefix keeps the contents raw. Recognized escapes are the conventional
/// ones (`\n`, `\t`, `\r`, `\0`, `\a`, `\b`, `\f`, `\v`, `\\`, `\'`, `\"`,
/// `\xHH`, `\uHHHH`, `\UHHHHHHHH`); anything else keeps its backslash, so
/// patterns like `"\s+"` survive unharmed.
pub(crate) fn unescape_literal(quoted: &str) -> Result<String, GrammarError> {
    let mut rest = quoted;
    if let Some(stripped) = rest.strip_prefix('u') {
        rest = stripped;
    }
    let mut raw = false;
    if let Some(stripped) = rest.strip_prefix('r') {
        rest = stripped;
        raw = true;
    }
    debug_assert!(
        rest.len() >= 2 && (rest.starts_with('"') || rest.starts_with('\'')),
        "spaceless_literal guarantees surrounding quotes: {quoted:?}"
    );
    let inner = &rest[1..rest.len() - 1];
    if raw {
        return Ok(inner.to_owned());
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => {
                return Err(GrammarError::BadEscape {
                    escape: "\\".to_owned(),
                });
            }
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('x') => out.push(hex_escape(&mut chars, 'x', 2)?),
            Some('u') => out.push(hex_escape(&mut chars, 'u', 4)?),
            Some('U') => out.push(hex_escape(&mut chars, 'U', 8)?),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn hex_escape(
    chars: &mut std::str::Chars<'_>,
    kind: char,
    digits: usize,
) -> Result<char, GrammarError> {
    let mut taken = String::new();
    let mut value: u32 = 0;
    for _ in 0..digits {
        let c = chars.next().ok_or_else(|| GrammarError::BadEscape {
            escape: format!("\\{kind}{taken}"),
        })?;
        taken.push(c);
        let digit = c.to_digit(16).ok_or_else(|| GrammarError::BadEscape {
            escape: format!("\\{kind}{taken}"),
        })?;
        value = value * 16 + digit;
    }
    char::from_u32(value).ok_or_else(|| GrammarError::BadEscape {
        escape: format!("\\{kind}{taken}"),
    })
}

/// Replaces every reachable [`ExprKind::LazyRef`] with the expression its
/// label maps to. Chains of references (`a = b`, `b = c`) are chased; a
/// chain that closes on itself names nothing matchable and is rewritten to
/// a never-matching expression so the grammar still compiles and fails at
/// the use site instead of recursing forever.
fn resolve_refs(
    arena: &mut ExprArena,
    rules: &mut IndexMap<String, ExprId>,
) -> Result<(), GrammarError> {
    let expr_count = arena.len();

    let mut targets = Vec::with_capacity(rules.len());
    for idx in 0..rules.len() {
        let id = rules[idx];
        targets.push(resolve_target(arena, rules, id)?);
    }
    for (slot, target) in rules.values_mut().zip(targets) {
        *slot = target;
    }

    for raw in 0..expr_count {
        let id = ExprId(raw as u32);
        let children = arena.child_ids(id);
        if children.is_empty() {
            continue;
        }
        let mut resolved = Vec::with_capacity(children.len());
        let mut changed = false;
        for &child in &children {
            let target = resolve_target(arena, rules, child)?;
            changed |= target != child;
            resolved.push(target);
        }
        if changed {
            arena.set_child_ids(id, &resolved);
        }
    }
    Ok(())
}

fn resolve_target(
    arena: &mut ExprArena,
    rules: &IndexMap<String, ExprId>,
    start: ExprId,
) -> Result<ExprId, GrammarError> {
    let mut seen: Vec<ExprId> = Vec::new();
    let mut id = start;
    loop {
        let label = match &arena[id].kind {
            ExprKind::LazyRef(label) => label.clone(),
            _ => return Ok(id),
        };
        if seen.contains(&id) {
            neutralize_alias_cycle(arena, &seen);
            return Ok(start);
        }
        seen.push(id);
        id = rules
            .get(&label)
            .copied()
            .ok_or(GrammarError::UndefinedLabel { label })?;
    }
}

/// A reference cycle with no expression anywhere (`a = b`, `b = a`) is
/// bound to a negative lookahead over the empty literal: it compiles,
/// renders as `!""`, and fails at any position without consuming input.
fn neutralize_alias_cycle(arena: &mut ExprArena, chain: &[ExprId]) {
    let empty = arena.push(ExprKind::Literal(String::new()));
    for &id in chain {
        arena.replace_kind(id, ExprKind::Not(empty));
    }
}
