//! The packrat matcher.
//!
//! One [`MatchContext`] drives one top-level parse: it owns the memo cache
//! and the furthest-failure tracker, both of which live exactly as long as
//! the call. Every expression attempt goes through the same
//! lookup/compute/store wrap, failures included — caching the "no match"
//! outcome is what bounds the whole parse at one evaluation per
//! (expression, position) pair.
//!
//! A mismatch is not an error here; it is an `Option::None` that flows back
//! up the expression graph. The grammar entry points turn the tracker state
//! into a reportable error only when the overall match fails.

use std::collections::HashMap;

use regex_automata::{Anchored, Input};

use crate::expr::{ExprArena, ExprId, ExprKind};
use crate::node::Node;

// Grow the call stack ahead of deeply nested grammars instead of trusting
// the OS default. Same constants as the usual stacker setups.
const STACK_RED_ZONE: usize = 32 * 1024;
const STACK_GROW: usize = 1024 * 1024;

/// Furthest-reaching failure seen during one parse. At equal positions a
/// named expression displaces an unnamed one, never the other way around.
#[derive(Debug, Default)]
pub(crate) struct FurthestFailure {
    record: Option<(usize, ExprId, bool)>,
}

impl FurthestFailure {
    fn note(&mut self, pos: usize, id: ExprId, named: bool) {
        let update = match self.record {
            None => true,
            Some((best_pos, _, best_named)) => {
                pos > best_pos || (pos == best_pos && named && !best_named)
            }
        };
        if update {
            self.record = Some((pos, id, named));
        }
    }

    pub(crate) fn get(&self) -> Option<(usize, ExprId)> {
        self.record.map(|(pos, id, _)| (pos, id))
    }
}

pub(crate) struct MatchContext<'a> {
    arena: &'a ExprArena,
    text: &'a str,
    cache: HashMap<(ExprId, usize), Option<Node<'a>>>,
    failure: FurthestFailure,
    #[cfg(test)]
    pub(crate) evaluations: Vec<(ExprId, usize)>,
}

impl<'a> MatchContext<'a> {
    pub(crate) fn new(arena: &'a ExprArena, text: &'a str) -> Self {
        Self {
            arena,
            text,
            cache: HashMap::new(),
            failure: FurthestFailure::default(),
            #[cfg(test)]
            evaluations: Vec::new(),
        }
    }

    pub(crate) fn failure(&self) -> Option<(usize, ExprId)> {
        self.failure.get()
    }

    /// Attempts `id` at `pos`, consulting and feeding the memo cache.
    pub(crate) fn match_expr(&mut self, id: ExprId, pos: usize) -> Option<Node<'a>> {
        if let Some(cached) = self.cache.get(&(id, pos)) {
            return cached.clone();
        }
        #[cfg(test)]
        self.evaluations.push((id, pos));

        let result =
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || self.match_uncached(id, pos));
        if result.is_none() {
            let named = !self.arena[id].name.is_empty();
            self.failure.note(pos, id, named);
        }
        self.cache.insert((id, pos), result.clone());
        result
    }

    fn match_uncached(&mut self, id: ExprId, pos: usize) -> Option<Node<'a>> {
        let arena = self.arena;
        let expr = &arena[id];
        let name = expr.name.as_str();
        let text = self.text;

        match &expr.kind {
            ExprKind::Literal(literal) => text.as_bytes()[pos..]
                .starts_with(literal.as_bytes())
                .then(|| Node::leaf(name, text, pos, pos + literal.len())),

            ExprKind::Regex(rx) => {
                let input = Input::new(text)
                    .range(pos..text.len())
                    .anchored(Anchored::Yes);
                let mut captures = rx.re.create_captures();
                rx.re.search_captures(&input, &mut captures);
                let end = captures.get_match()?.end();
                Some(Node::with_captures(name, text, pos, end, captures))
            }

            ExprKind::Sequence(members) => {
                let mut children = Vec::with_capacity(members.len());
                let mut end = pos;
                for &member in members {
                    let node = self.match_expr(member, end)?;
                    end = node.end();
                    children.push(node);
                }
                Some(Node::new(name, text, pos, end, children))
            }

            ExprKind::OneOf(members) => {
                for &member in members {
                    if let Some(node) = self.match_expr(member, pos) {
                        let end = node.end();
                        return Some(Node::new(name, text, pos, end, vec![node]));
                    }
                }
                None
            }

            ExprKind::Lookahead(inner) => self
                .match_expr(*inner, pos)
                .map(|_| Node::leaf(name, text, pos, pos)),

            ExprKind::Not(inner) => self
                .match_expr(*inner, pos)
                .is_none()
                .then(|| Node::leaf(name, text, pos, pos)),

            ExprKind::Optional(inner) => Some(match self.match_expr(*inner, pos) {
                Some(node) => {
                    let end = node.end();
                    Node::new(name, text, pos, end, vec![node])
                }
                None => Node::leaf(name, text, pos, pos),
            }),

            ExprKind::ZeroOrMore(inner) => {
                let mut children = Vec::new();
                let mut end = pos;
                loop {
                    match self.match_expr(*inner, end) {
                        // A zero-width iteration would repeat forever; stop.
                        Some(node) if node.end() > end => {
                            end = node.end();
                            children.push(node);
                        }
                        _ => break,
                    }
                }
                Some(Node::new(name, text, pos, end, children))
            }

            ExprKind::OneOrMore { inner, min } => {
                let mut children = Vec::new();
                let mut end = pos;
                loop {
                    let Some(node) = self.match_expr(*inner, end) else {
                        break;
                    };
                    let zero_width = node.end() == end;
                    end = node.end();
                    children.push(node);
                    // The zero-width match still counts, but once.
                    if zero_width {
                        break;
                    }
                }
                (children.len() >= *min).then(|| Node::new(name, text, pos, end, children))
            }

            ExprKind::LazyRef(label) => {
                unreachable!("lazy reference {label:?} survived grammar resolution")
            }
        }
    }
}
