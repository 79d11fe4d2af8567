//! Parse tree traversal.
//!
//! A [`NodeVisitor`] turns a parse tree into some other value: depth-first,
//! left-to-right, bottom-up. Each node's handler receives the node and the
//! already-computed values of its children. Implementations match on
//! [`Node::rule_name`] in [`visit_node`](NodeVisitor::visit_node); nodes
//! produced by anonymous sub-expressions never reach `visit_node` and go to
//! [`generic_visit`](NodeVisitor::generic_visit) instead, which by default
//! reports that no handler is defined.
//!
//! Trees are never transformed in place. Memoization may share one node
//! between several positions in a tree, and an error report needs the
//! original tree to point into.

use std::any::type_name;

use crate::node::Node;

// Visiting recurses as deep as the parse tree; grow the stack the same way
// the matcher does.
const STACK_RED_ZONE: usize = 32 * 1024;
const STACK_GROW: usize = 1024 * 1024;

/// What a handler can return: a value, a signal that this rule has no
/// handler, or the visitor's own error. `From<E>` lets handlers use `?` on
/// anything convertible into their error type.
#[derive(Debug)]
pub enum HandlerError<E> {
    /// No handler is defined for the dispatched rule.
    NoHandler,
    Error(E),
}

impl<E> From<E> for HandlerError<E> {
    fn from(error: E) -> Self {
        HandlerError::Error(error)
    }
}

/// A handler failure, annotated with where in the tree it happened.
///
/// Handler errors are wrapped exactly once: an error bubbling up through the
/// ancestors of the failing node is not re-wrapped. `Passthrough` carries
/// errors the visitor asked to keep verbatim via
/// [`pass_through`](NodeVisitor::pass_through).
#[derive(Debug, thiserror::Error)]
pub enum VisitationError<E: std::error::Error + 'static> {
    #[error("no visitor handler for rule {rule:?}\n\nparse tree:\n{excerpt}")]
    NoHandler { rule: String, excerpt: String },

    #[error("{kind}: {source}\n\nparse tree:\n{excerpt}")]
    Handler {
        /// Type name of the original error.
        kind: &'static str,
        #[source]
        source: E,
        /// Pretty-printed subtree with the offending node marked.
        excerpt: String,
    },

    #[error(transparent)]
    Passthrough(E),
}

pub trait NodeVisitor {
    type Output;
    type Error: std::error::Error + 'static;

    /// Handler dispatch for named nodes. Implementations match on
    /// `node.rule_name()` and should defer unhandled rules to
    /// [`generic_visit`](Self::generic_visit).
    fn visit_node(
        &mut self,
        node: &Node<'_>,
        children: Vec<Self::Output>,
    ) -> Result<Self::Output, HandlerError<Self::Error>>;

    /// Fallback handler; also the only handler anonymous nodes dispatch to.
    fn generic_visit(
        &mut self,
        _node: &Node<'_>,
        _children: Vec<Self::Output>,
    ) -> Result<Self::Output, HandlerError<Self::Error>> {
        Err(HandlerError::NoHandler)
    }

    /// Errors for which this returns `true` propagate verbatim instead of
    /// being wrapped with tree context.
    fn pass_through(&self, _error: &Self::Error) -> bool {
        false
    }

    /// Returns the sole child value; for productions that merely forward one
    /// sub-expression.
    fn lift_child(
        &mut self,
        _node: &Node<'_>,
        children: Vec<Self::Output>,
    ) -> Result<Self::Output, HandlerError<Self::Error>> {
        let mut children = children.into_iter();
        match (children.next(), children.next()) {
            (Some(only), None) => Ok(only),
            _ => Err(HandlerError::NoHandler),
        }
    }

    /// Walks the tree bottom-up and dispatches each node.
    fn visit(&mut self, node: &Node<'_>) -> Result<Self::Output, VisitationError<Self::Error>> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || {
            let mut children = Vec::with_capacity(node.children().len());
            for child in node.children() {
                children.push(self.visit(child)?);
            }
            let result = if node.is_anonymous() {
                self.generic_visit(node, children)
            } else {
                self.visit_node(node, children)
            };
            result.map_err(|error| self.annotate(node, error))
        })
    }

    /// Attaches tree context to a handler failure.
    #[doc(hidden)]
    fn annotate(
        &self,
        node: &Node<'_>,
        error: HandlerError<Self::Error>,
    ) -> VisitationError<Self::Error> {
        match error {
            HandlerError::NoHandler => VisitationError::NoHandler {
                rule: node.rule_name().to_owned(),
                excerpt: node.pretty_with_marker(node),
            },
            HandlerError::Error(source) if self.pass_through(&source) => {
                VisitationError::Passthrough(source)
            }
            HandlerError::Error(source) => VisitationError::Handler {
                kind: type_name::<Self::Error>(),
                source,
                excerpt: node.pretty_with_marker(node),
            },
        }
    }
}
