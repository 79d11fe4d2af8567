//! Grammars: ordered collections of named rules.
//!
//! A [`Grammar`] is compiled from rule-syntax text and is immutable from
//! then on; the rule map and expression storage sit behind a shared
//! allocation, so cloning a grammar or re-pointing its default rule
//! ([`Grammar::default`]) is cheap. Parsing can start from the default rule
//! or from any rule obtained via [`Grammar::rule`]. Each parse call builds
//! its own packrat cache, so one grammar can serve any number of threads at
//! once.

mod bootstrap;
mod compile;

#[cfg(test)]
mod grammar_tests;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{GrammarError, ParseError};
use crate::expr::{ExprArena, ExprId};
use crate::matcher::MatchContext;
use crate::node::Node;

use self::compile::GrammarParts;

#[derive(Debug)]
struct GrammarInner {
    arena: ExprArena,
    rules: IndexMap<String, ExprId>,
}

/// A compiled grammar: an ordered map from rule name to expression plus a
/// designated default rule.
#[derive(Clone, Debug)]
pub struct Grammar {
    inner: Arc<GrammarInner>,
    default: ExprId,
}

impl Grammar {
    /// Compiles rule-syntax text. The first rule becomes the default rule.
    pub fn new(source: &str) -> Result<Self, GrammarError> {
        Self::compile(source, None)
    }

    /// Compiles rule-syntax text with an explicitly chosen default rule.
    pub fn with_default(source: &str, default_rule: &str) -> Result<Self, GrammarError> {
        Self::compile(source, Some(default_rule))
    }

    fn compile(source: &str, default_rule: Option<&str>) -> Result<Self, GrammarError> {
        let tree = bootstrap::rule_grammar()
            .parse(source)
            .map_err(GrammarError::BadGrammar)?;
        let parts = compile::compile_tree(&tree)?;
        Self::from_parts(parts, default_rule)
    }

    pub(crate) fn from_parts(
        parts: GrammarParts,
        default_rule: Option<&str>,
    ) -> Result<Self, GrammarError> {
        let GrammarParts {
            arena,
            rules,
            first_rule,
        } = parts;
        let name = default_rule.unwrap_or(&first_rule);
        let default = rules
            .get(name)
            .copied()
            .ok_or_else(|| GrammarError::UndefinedLabel {
                label: name.to_owned(),
            })?;
        Ok(Self::from_raw_parts(arena, rules, default))
    }

    pub(crate) fn from_raw_parts(
        arena: ExprArena,
        rules: IndexMap<String, ExprId>,
        default: ExprId,
    ) -> Self {
        Self {
            inner: Arc::new(GrammarInner { arena, rules }),
            default,
        }
    }

    /// Looks up a rule by name.
    pub fn rule(&self, name: &str) -> Option<RuleRef<'_>> {
        self.inner.rules.get(name).map(|&id| RuleRef { grammar: self, id })
    }

    /// The rules in definition order, with the names they are bound to.
    pub fn rules(&self) -> impl Iterator<Item = (&str, RuleRef<'_>)> {
        self.inner
            .rules
            .iter()
            .map(|(name, &id)| (name.as_str(), RuleRef { grammar: self, id }))
    }

    pub fn default_rule(&self) -> RuleRef<'_> {
        RuleRef {
            grammar: self,
            id: self.default,
        }
    }

    /// A view of the same grammar with a different default rule. Shares all
    /// storage with `self`.
    pub fn default(&self, name: &str) -> Result<Self, GrammarError> {
        let rule = self.rule(name).ok_or_else(|| GrammarError::UndefinedLabel {
            label: name.to_owned(),
        })?;
        Ok(Self {
            inner: Arc::clone(&self.inner),
            default: rule.id,
        })
    }

    /// Parses `text` with the default rule; the match must consume the
    /// whole input.
    pub fn parse<'a>(&'a self, text: &'a str) -> Result<Node<'a>, ParseError> {
        self.default_rule().parse(text)
    }

    /// Like [`parse`](Self::parse), starting at byte offset `pos` and
    /// consuming through to the end.
    pub fn parse_from<'a>(&'a self, text: &'a str, pos: usize) -> Result<Node<'a>, ParseError> {
        self.default_rule().parse_from(text, pos)
    }

    /// Matches a prefix of `text` at `pos` with the default rule; trailing
    /// input is allowed.
    pub fn match_from<'a>(&'a self, text: &'a str, pos: usize) -> Result<Node<'a>, ParseError> {
        self.default_rule().match_from(text, pos)
    }
}

#[cfg(test)]
impl Grammar {
    pub(crate) fn arena(&self) -> &ExprArena {
        &self.inner.arena
    }

    pub(crate) fn expr_id(&self, name: &str) -> ExprId {
        self.inner.rules[name]
    }
}

impl TryFrom<&str> for Grammar {
    type Error = GrammarError;

    fn try_from(source: &str) -> Result<Self, GrammarError> {
        Self::new(source)
    }
}

/// Renders the grammar in rule syntax. Compiling the rendering yields a
/// grammar that accepts the same language.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = &self.inner.arena;
        for (name, &id) in &self.inner.rules {
            let mut rhs = String::new();
            arena.render_rhs(id, &mut rhs);
            writeln!(f, "{name} = {rhs}")?;
        }
        Ok(())
    }
}

/// One rule of a grammar, usable as a start symbol.
#[derive(Clone, Copy)]
pub struct RuleRef<'g> {
    grammar: &'g Grammar,
    id: ExprId,
}

impl<'g> RuleRef<'g> {
    /// The name of the underlying expression. Usually the name the rule was
    /// looked up under; for a rule defined as a bare reference (`a = b`)
    /// it is the referenced rule's name.
    pub fn name(&self) -> &'g str {
        &self.grammar.inner.arena[self.id].name
    }

    /// Parses `text` from the beginning; must consume the whole input.
    pub fn parse<'a>(&self, text: &'a str) -> Result<Node<'a>, ParseError>
    where
        'g: 'a,
    {
        self.run(text, 0, true)
    }

    /// Parses from `pos`, consuming through to the end of `text`.
    pub fn parse_from<'a>(&self, text: &'a str, pos: usize) -> Result<Node<'a>, ParseError>
    where
        'g: 'a,
    {
        self.run(text, pos, true)
    }

    /// Matches a prefix of `text` at `pos`; trailing input is allowed.
    pub fn match_from<'a>(&self, text: &'a str, pos: usize) -> Result<Node<'a>, ParseError>
    where
        'g: 'a,
    {
        self.run(text, pos, false)
    }

    fn run<'a>(&self, text: &'a str, pos: usize, must_consume: bool) -> Result<Node<'a>, ParseError>
    where
        'g: 'a,
    {
        let arena = &self.grammar.inner.arena;
        // Spans are byte offsets into `text`; a start position outside it or
        // inside a multi-byte character can never begin a match.
        if !text.is_char_boundary(pos) {
            return Err(ParseError::mismatch(
                text,
                pos,
                self.name(),
                arena.render_rule(self.id),
            ));
        }
        let mut ctx = MatchContext::new(arena, text);
        match ctx.match_expr(self.id, pos) {
            Some(node) if must_consume && node.end() < text.len() => Err(ParseError::incomplete(
                text,
                node.end(),
                self.name(),
                arena.render_rule(self.id),
            )),
            Some(node) => Ok(node),
            None => {
                let (fail_pos, fail_id) = ctx.failure().unwrap_or((pos, self.id));
                let expr = &arena[fail_id];
                Err(ParseError::mismatch(
                    text,
                    fail_pos,
                    &expr.name,
                    arena.render_rule(fail_id),
                ))
            }
        }
    }
}

impl fmt::Display for RuleRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.grammar.inner.arena.render_rule(self.id))
    }
}

impl fmt::Debug for RuleRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRef")
            .field("rule", &self.grammar.inner.arena.render_rule(self.id))
            .finish()
    }
}
