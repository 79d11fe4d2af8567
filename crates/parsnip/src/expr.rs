//! Parsing expressions and the arena that owns them.
//!
//! A compiled grammar is a web of expressions referencing one another, cycles
//! included. The web lives in an [`ExprArena`]; expressions hold [`ExprId`]
//! indices instead of pointers, and the index doubles as the identity key of
//! the packrat cache. The matching logic itself is in `matcher`; this module
//! is the data model plus the rule-text renderer used by `Display` and error
//! messages.

use std::fmt::Write;
use std::ops::Index;

use regex_automata::meta;
use regex_automata::util::syntax;

use crate::error::GrammarError;

/// Identity of an expression within its arena. Doubles as the memo key of
/// the packrat cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct ExprId(pub(crate) u32);

/// An expression plus the rule name it is bound to. Top-level rules have
/// names; sub-expressions are anonymous (empty name) and produce nodes that
/// do not dispatch in the visitor.
#[derive(Debug)]
pub(crate) struct RuleExpr {
    pub(crate) name: String,
    pub(crate) kind: ExprKind,
}

#[derive(Debug)]
pub(crate) enum ExprKind {
    /// Matches an exact string.
    Literal(String),
    /// Matches a compiled pattern anchored at the current position.
    Regex(Box<RegexExpr>),
    /// Matches each member contiguously.
    Sequence(Vec<ExprId>),
    /// Ordered choice; the first member to match wins.
    OneOf(Vec<ExprId>),
    /// Zero-width success iff the inner expression matches.
    Lookahead(ExprId),
    /// Zero-width success iff the inner expression does not match.
    Not(ExprId),
    Optional(ExprId),
    ZeroOrMore(ExprId),
    /// Greedy repetition with a minimum count. The rule syntax `+` always
    /// means `min = 1`; larger minima are constructible in code only.
    OneOrMore { inner: ExprId, min: usize },
    /// A name standing in for a rule whose expression is not known yet.
    /// Only exists between the construction and resolution passes of
    /// grammar compilation; no resolved grammar contains one.
    LazyRef(String),
}

/// Flags accepted on a `~"..."` regex term, one letter each.
///
/// `i`, `m`, `s`, and `x` map to the engine's case-insensitive, multi-line,
/// dot-matches-newline, and ignore-whitespace modes. This engine interprets
/// character classes as Unicode categories unconditionally, so `u` is
/// accepted and redundant; `l` (locale-dependent classes) has no equivalent
/// and is accepted and ignored. Both still round-trip through rendering.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub(crate) struct RegexFlags {
    pub ignore_case: bool,
    pub locale: bool,
    pub multiline: bool,
    pub dot_all: bool,
    pub unicode: bool,
    pub verbose: bool,
}

impl RegexFlags {
    /// Rendered flag run, fixed `ilmsux` order.
    pub(crate) fn suffix(&self) -> String {
        let mut out = String::new();
        for (set, ch) in [
            (self.ignore_case, 'i'),
            (self.locale, 'l'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.unicode, 'u'),
            (self.verbose, 'x'),
        ] {
            if set {
                out.push(ch);
            }
        }
        out
    }
}

/// A compiled regex expression: the source pattern (for rendering), its
/// flags, and the compiled matcher.
#[derive(Debug)]
pub(crate) struct RegexExpr {
    pub(crate) pattern: String,
    pub(crate) flags: RegexFlags,
    pub(crate) re: meta::Regex,
}

impl RegexExpr {
    pub(crate) fn new(pattern: String, flags: RegexFlags) -> Result<Self, GrammarError> {
        let re = meta::Regex::builder()
            .syntax(
                syntax::Config::new()
                    .case_insensitive(flags.ignore_case)
                    .multi_line(flags.multiline)
                    .dot_matches_new_line(flags.dot_all)
                    .ignore_whitespace(flags.verbose),
            )
            .build(&pattern)
            .map_err(|e| GrammarError::BadRegex {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { pattern, flags, re })
    }
}

/// Owns every expression of one grammar. Indices are stable; nothing is ever
/// removed, so cyclic reference webs need no special reclamation.
#[derive(Default, Debug)]
pub(crate) struct ExprArena {
    exprs: Vec<RuleExpr>,
}

impl ExprArena {
    pub(crate) fn push(&mut self, kind: ExprKind) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(RuleExpr {
            name: String::new(),
            kind,
        });
        id
    }

    pub(crate) fn set_name(&mut self, id: ExprId, name: &str) {
        self.exprs[id.0 as usize].name = name.to_owned();
    }

    /// Replaces the expression behind `id`, keeping its name. Used to patch
    /// forward references when hand-assembling the bootstrap grammar and to
    /// neutralize alias cycles during resolution.
    pub(crate) fn replace_kind(&mut self, id: ExprId, kind: ExprKind) {
        self.exprs[id.0 as usize].kind = kind;
    }

    pub(crate) fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Member ids of an expression, in match order.
    pub(crate) fn child_ids(&self, id: ExprId) -> Vec<ExprId> {
        match &self[id].kind {
            ExprKind::Sequence(members) | ExprKind::OneOf(members) => members.clone(),
            ExprKind::Lookahead(inner)
            | ExprKind::Not(inner)
            | ExprKind::Optional(inner)
            | ExprKind::ZeroOrMore(inner)
            | ExprKind::OneOrMore { inner, .. } => vec![*inner],
            ExprKind::Literal(_) | ExprKind::Regex(_) | ExprKind::LazyRef(_) => Vec::new(),
        }
    }

    /// Rewrites member ids in the order [`child_ids`](Self::child_ids)
    /// returned them.
    pub(crate) fn set_child_ids(&mut self, id: ExprId, ids: &[ExprId]) {
        match &mut self.exprs[id.0 as usize].kind {
            ExprKind::Sequence(members) | ExprKind::OneOf(members) => {
                debug_assert_eq!(members.len(), ids.len());
                members.copy_from_slice(ids);
            }
            ExprKind::Lookahead(inner)
            | ExprKind::Not(inner)
            | ExprKind::Optional(inner)
            | ExprKind::ZeroOrMore(inner)
            | ExprKind::OneOrMore { inner, .. } => {
                debug_assert_eq!(ids.len(), 1);
                *inner = ids[0];
            }
            ExprKind::Literal(_) | ExprKind::Regex(_) | ExprKind::LazyRef(_) => {
                debug_assert!(ids.is_empty());
            }
        }
    }

    /// `name = rhs` for named expressions, bare rhs for anonymous ones.
    pub(crate) fn render_rule(&self, id: ExprId) -> String {
        let expr = &self[id];
        let mut out = String::new();
        if !expr.name.is_empty() {
            out.push_str(&expr.name);
            out.push_str(" = ");
        }
        self.render_rhs(id, &mut out);
        out
    }

    /// The right-hand side of a rule, ignoring the expression's own name.
    pub(crate) fn render_rhs(&self, id: ExprId, out: &mut String) {
        self.render_kind(id, out);
    }

    /// Renders `id` as a member of an enclosing expression: named members
    /// become references, anonymous members render structurally and are
    /// parenthesized when their shape binds looser than the context allows.
    fn render_member(&self, id: ExprId, min_prec: u8, out: &mut String) {
        let expr = &self[id];
        if !expr.name.is_empty() {
            out.push_str(&expr.name);
            return;
        }
        if precedence(&expr.kind) >= min_prec {
            self.render_kind(id, out);
        } else {
            out.push('(');
            self.render_kind(id, out);
            out.push(')');
        }
    }

    fn render_kind(&self, id: ExprId, out: &mut String) {
        match &self[id].kind {
            ExprKind::Literal(literal) => {
                out.push('"');
                escape_into(literal, out);
                out.push('"');
            }
            ExprKind::Regex(rx) => {
                out.push_str("~\"");
                escape_into(&rx.pattern, out);
                out.push('"');
                out.push_str(&rx.flags.suffix());
            }
            ExprKind::Sequence(members) => {
                for (i, &member) in members.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.render_member(member, TERM_PREC, out);
                }
            }
            ExprKind::OneOf(members) => {
                for (i, &member) in members.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" / ");
                    }
                    self.render_member(member, TERM_PREC, out);
                }
            }
            ExprKind::Lookahead(inner) => {
                out.push('&');
                self.render_member(*inner, TERM_PREC, out);
            }
            ExprKind::Not(inner) => {
                out.push('!');
                self.render_member(*inner, TERM_PREC, out);
            }
            ExprKind::Optional(inner) => {
                self.render_member(*inner, ATOM_PREC, out);
                out.push('?');
            }
            ExprKind::ZeroOrMore(inner) => {
                self.render_member(*inner, ATOM_PREC, out);
                out.push('*');
            }
            ExprKind::OneOrMore { inner, .. } => {
                self.render_member(*inner, ATOM_PREC, out);
                out.push('+');
            }
            ExprKind::LazyRef(label) => out.push_str(label),
        }
    }
}

impl Index<ExprId> for ExprArena {
    type Output = RuleExpr;

    fn index(&self, id: ExprId) -> &RuleExpr {
        &self.exprs[id.0 as usize]
    }
}

/// How tightly an expression's rendering binds: alternation loosest, then
/// sequence, then terms (lookahead, negation, quantified), then atoms.
const ONEOF_PREC: u8 = 0;
const SEQUENCE_PREC: u8 = 1;
const TERM_PREC: u8 = 2;
const ATOM_PREC: u8 = 3;

fn precedence(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::OneOf(_) => ONEOF_PREC,
        ExprKind::Sequence(_) => SEQUENCE_PREC,
        ExprKind::Lookahead(_)
        | ExprKind::Not(_)
        | ExprKind::Optional(_)
        | ExprKind::ZeroOrMore(_)
        | ExprKind::OneOrMore { .. } => TERM_PREC,
        ExprKind::Literal(_) | ExprKind::Regex(_) | ExprKind::LazyRef(_) => ATOM_PREC,
    }
}

/// Escapes `s` for inclusion in a double-quoted rule-syntax literal, the
/// inverse of the compiler's escape evaluation.
fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    write!(out, "\\x{code:02x}").expect("String write never fails");
                } else if code <= 0xffff {
                    write!(out, "\\u{code:04x}").expect("String write never fails");
                } else {
                    write!(out, "\\U{code:08x}").expect("String write never fails");
                }
            }
            c => out.push(c),
        }
    }
}
